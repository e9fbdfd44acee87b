use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use pgexec::Result;

mod connection;
mod lifecycle;
mod types;
mod error;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::trace_span!("connection").in_scope(connection::main)?;
    tracing::trace_span!("lifecycle").in_scope(lifecycle::main)?;
    tracing::trace_span!("types").in_scope(types::main)?;
    tracing::trace_span!("error").in_scope(error::main)?;

    Ok(())
}
