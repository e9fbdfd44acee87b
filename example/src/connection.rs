use std::env::var;
use pgexec::{Config, Connection, Result, Session, StatementExecutor};

pub fn main() -> Result<()> {
    if let Ok(url) = var("DATABASE_URL") {
        let mut conn = Connection::connect(&url)?;
        conn.simple_query("SELECT 1")?;
        conn.close()?;
    }

    let mut conn = Connection::connect_with(Config::from_env().app_name("pgexec-example"))?;
    assert_eq!(conn.parameter("application_name"), Some("pgexec-example"));

    println!("server info: {}", conn.server_info());
    println!("server version: {}", conn.server_version());
    println!("host info: {}", conn.host_info());
    println!("session encoding: {}", conn.session_encoding());

    let mut exe = StatementExecutor::new(&mut conn);
    exe.prepare("SELECT 1")?;
    exe.execute()?;
    assert!(exe.fetch()?);
    assert_eq!(exe.get::<i32>(0)?, 1);
    drop(exe);

    conn.close()?;

    Ok(())
}
