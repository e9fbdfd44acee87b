//! Postgres connection.
//!
//! A blocking client for the v3 frontend/backend protocol, used by
//! [`StatementExecutor`][crate::StatementExecutor] through the [`Session`] trait.
use std::collections::HashMap;

use crate::{
    Error, ErrorKind, Result,
    column::MetaColumn,
    common::{span, verbose, warning},
    param::InputParameter,
    postgres::{
        BackendMessage, Oid, PgFormat, ProtocolError,
        backend::{BackendKeyData, RowDescription},
        frontend, oid,
    },
    session::{RawRow, Session, StatementInfo},
    statement::StatementName,
};

mod config;
mod result;
mod scram;
mod startup;
mod stream;

pub use config::{Config, ParseError};
pub use result::PgResult;
pub use startup::UnsupportedAuth;

use stream::PgStream;

/// Single postgres connection.
#[derive(Debug)]
pub struct Connection {
    stream: PgStream,
    config: Config,
    param_status: HashMap<String, String>,
    key_data: Option<BackendKeyData>,
    broken: bool,
}

impl Connection {
    /// Connect using [`Config::from_env`].
    pub fn connect_env() -> Result<Self> {
        Self::connect_with(Config::from_env())
    }

    /// Connect using url, see [`Config::parse`].
    pub fn connect(url: &str) -> Result<Self> {
        Self::connect_with(Config::parse(url)?)
    }

    /// Connect using given config.
    pub fn connect_with(config: Config) -> Result<Self> {
        span!("connect", host = %config.host, port = config.port);
        let mut stream = PgStream::connect(&config)?;
        let startup::StartupResponse { key_data, param_status } = startup::startup(&config, &mut stream)?;

        Ok(Self { stream, config, param_status, key_data, broken: false })
    }

    /// Runtime parameter reported by server, e.g. `server_version`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.param_status.get(name).map(String::as_str)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `sql` in the simple query protocol, returns rows affected by the last command.
    ///
    /// Rows returned by the statement are discarded.
    pub fn simple_query(&mut self, sql: &str) -> Result<u64> {
        span!("simple_query");
        self.ensure_usable()?;
        self.stream.send(frontend::Query { sql });
        let result = self.stream.flush().map_err(Error::from).and_then(|_| {
            let mut rows_affected = 0;
            loop {
                use BackendMessage::*;
                match self.next_message()? {
                    ReadyForQuery(_) => break,
                    CommandComplete(tag) => rows_affected = tag.rows_affected(),
                    RowDescription(_) | DataRow(_) | EmptyQueryResponse(_) => {}
                    f => Err(f.unexpected("simple query"))?,
                }
            }
            Ok(rows_affected)
        });
        self.recover(result)
    }

    /// Send `Terminate` and shutdown the socket.
    pub fn close(mut self) -> Result<()> {
        self.broken = true;
        self.stream.send(frontend::Terminate);
        self.stream.flush()?;
        self.stream.shutdown()?;
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.broken {
            return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "connection is broken").into());
        }
        Ok(())
    }

    /// Keep the connection in sync after a failed exchange.
    ///
    /// A server error is followed by `ReadyForQuery` once `Sync` is processed, anything
    /// else leaves the stream in an unknown position.
    fn recover<T>(&mut self, result: Result<T>) -> Result<T> {
        let err = match result {
            Ok(ok) => return Ok(ok),
            Err(err) => err,
        };

        if matches!(err.kind(), ErrorKind::Database(_)) && !err.is_connection_error() {
            if let Err(_drain) = self.wait_ready() {
                warning!("failed to resync connection: {_drain}");
                self.broken = true;
            }
        } else {
            warning!("connection is no longer usable: {err}");
            self.broken = true;
        }

        Err(err)
    }

    /// Discard messages until `ReadyForQuery`.
    fn wait_ready(&mut self) -> Result<()> {
        loop {
            match self.stream.recv::<BackendMessage>() {
                Ok(BackendMessage::ReadyForQuery(_)) => return Ok(()),
                Ok(_msg) => {
                    verbose!(msgtype = %(_msg.msgtype() as char), "discarded");
                }
                Err(err) if matches!(err.kind(), ErrorKind::Database(_)) && !err.is_connection_error() => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Next message of the current exchange.
    ///
    /// `ParameterStatus` and `NotificationResponse` may arrive at any time, they are
    /// consumed here.
    fn next_message(&mut self) -> Result<BackendMessage> {
        loop {
            match self.stream.recv()? {
                BackendMessage::ParameterStatus(param) => {
                    verbose!(name = %param.name, value = %param.value, "parameter status");
                    self.param_status.insert(param.name, param.value);
                }
                BackendMessage::NotificationResponse(_notify) => {
                    verbose!(channel = %_notify.channel, "notification ignored");
                }
                msg => return Ok(msg),
            }
        }
    }

    fn prepare(&mut self, name: &StatementName, sql: &str) -> Result<StatementInfo> {
        self.stream.send(frontend::Parse { prepare_name: name, sql, oids: &[] });
        self.stream.send(frontend::Describe { kind: b'S', name });
        self.stream.send(frontend::Sync);
        self.stream.flush()?;

        let mut param_types = None;
        let mut described = None;
        loop {
            use BackendMessage::*;
            match self.next_message()? {
                ParseComplete(_) => {}
                ParameterDescription(desc) => param_types = Some(desc.oids),
                RowDescription(desc) => described = Some(columns(&desc)?),
                NoData(_) => described = Some(vec![]),
                ReadyForQuery(_) => break,
                f => Err(f.unexpected("prepare"))?,
            }
        }

        match (param_types, described) {
            (Some(param_types), Some(columns)) => Ok(StatementInfo { param_types, columns }),
            _ => Err(ProtocolError::malformed("incomplete statement description").into()),
        }
    }

    fn execute(
        &mut self,
        name: &StatementName,
        param_types: &[Oid],
        params: &[InputParameter<'_>],
    ) -> Result<PgResult> {
        let encoded = params
            .iter()
            .enumerate()
            .map(|(i, param)| param.encode_for(param_types.get(i).copied().unwrap_or(oid::UNSPECIFIED)))
            .collect::<Vec<_>>();

        self.stream.send(frontend::Bind {
            portal_name: "",
            stmt_name: name,
            params: &encoded,
            result_format: PgFormat::Binary,
        });
        self.stream.send(frontend::Describe { kind: b'P', name: "" });
        self.stream.send(frontend::Execute { portal_name: "", max_row: 0 });
        self.stream.send(frontend::Sync);
        self.stream.flush()?;

        let mut result = PgResult::default();
        loop {
            use BackendMessage::*;
            match self.next_message()? {
                BindComplete(_) | NoData(_) | EmptyQueryResponse(_) => {}
                RowDescription(desc) => result.columns = columns(&desc)?,
                DataRow(row) => result.rows.push(RawRow::from_data_row(row)),
                CommandComplete(tag) => {
                    result.rows_affected = tag.rows_affected();
                    result.tag = tag.tag;
                }
                ReadyForQuery(_) => break,
                f => Err(f.unexpected("execute"))?,
            }
        }

        verbose!(rows = result.rows.len(), tag = %result.tag, "executed");
        Ok(result)
    }

    fn close_statement(&mut self, name: &StatementName) -> Result<()> {
        self.stream.send(frontend::Close { variant: b'S', name });
        self.stream.send(frontend::Sync);
        self.stream.flush()?;
        loop {
            match self.next_message()? {
                BackendMessage::CloseComplete(_) => {}
                BackendMessage::ReadyForQuery(_) => return Ok(()),
                f => Err(f.unexpected("close statement"))?,
            }
        }
    }
}

fn columns(desc: &RowDescription) -> Result<Vec<MetaColumn>> {
    Ok(desc
        .fields()?
        .iter()
        .enumerate()
        .map(|(i, field)| MetaColumn::from_field(i, field))
        .collect())
}

impl Session for Connection {
    type NativeResult = PgResult;

    fn register_prepared(&mut self, name: &StatementName, sql: &str) -> Result<StatementInfo> {
        self.ensure_usable()?;
        let result = self.prepare(name, sql);
        self.recover(result)
    }

    fn bind_and_execute(
        &mut self,
        name: &StatementName,
        param_types: &[Oid],
        params: &[InputParameter<'_>],
    ) -> Result<Self::NativeResult> {
        self.ensure_usable()?;
        let result = self.execute(name, param_types, params);
        self.recover(result)
    }

    fn describe_result(&self, result: &Self::NativeResult) -> Vec<MetaColumn> {
        result.columns.clone()
    }

    fn affected_row_count(&self, result: &Self::NativeResult) -> u64 {
        result.rows_affected
    }

    fn fetch_next_row(&self, result: &Self::NativeResult, cursor: usize) -> Option<RawRow> {
        result.rows.get(cursor).cloned()
    }

    fn release_result(&mut self, result: Self::NativeResult) {
        drop(result);
    }

    fn deallocate(&mut self, name: &StatementName) -> Result<()> {
        self.ensure_usable()?;
        let result = self.close_statement(name);
        self.recover(result)
    }

    fn is_usable(&self) -> bool {
        !self.broken
    }

    fn server_info(&self) -> String {
        let pid = self.key_data.map_or(0, |e| e.process_id);
        format!("Process ID: {pid} Protocol Version: 3")
    }

    fn server_version(&self) -> i32 {
        self.parameter("server_version").map_or(0, parse_server_version)
    }

    fn host_info(&self) -> String {
        match &self.config.socket {
            Some(socket) => socket.clone(),
            None => self.config.host.clone(),
        }
    }

    fn session_encoding(&self) -> String {
        self.parameter("client_encoding").unwrap_or(startup::CLIENT_ENCODING).into()
    }
}

/// Numeric server version as reported by libpq, `16.2` is `160002`, `9.6.3` is `90603`.
fn parse_server_version(version: &str) -> i32 {
    let version = version.split_whitespace().next().unwrap_or_default();
    let mut parts = version.split('.').map(|part| {
        let digits = part.find(|c: char| !c.is_ascii_digit()).unwrap_or(part.len());
        part[..digits].parse::<i32>().unwrap_or(0)
    });

    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    if major >= 10 {
        major * 10_000 + minor
    } else {
        let patch = parts.next().unwrap_or(0);
        major * 10_000 + minor * 100 + patch
    }
}
