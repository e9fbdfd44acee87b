//! In memory [`Session`] simulating a server.
use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use super::{RawRow, Session, StatementInfo};
use crate::{
    Result,
    column::MetaColumn,
    decode::DecodeError,
    param::InputParameter,
    postgres::{DatabaseError, Oid, PgFormat, oid},
    statement::StatementName,
    types::SqlType,
    value::Value,
};

type Handler = Box<dyn Fn(&[Option<Value>]) -> Result<MockResult, DatabaseError>>;

/// Canned statement behavior.
struct Statement {
    info: StatementInfo,
    handler: Option<Handler>,
}

#[derive(Debug)]
pub struct MockResult {
    pub columns: Vec<MetaColumn>,
    pub rows: Vec<RawRow>,
    pub affected: u64,
}

impl MockResult {
    pub fn rows(columns: Vec<MetaColumn>, rows: Vec<RawRow>) -> Self {
        let affected = rows.len() as u64;
        Self { columns, rows, affected }
    }

    pub fn affected(affected: u64) -> Self {
        Self { columns: vec![], rows: vec![], affected }
    }
}

/// Server simulation.
///
/// Statements registered with [`MockSession::statement`] run their handler, any
/// other sql is accepted and echoes its parameters back as a single row.
#[derive(Default)]
pub struct MockSession {
    statements: HashMap<String, Statement>,
    rejected: HashSet<String>,
    prepared: HashMap<String, String>,
    fail_next_execute: Option<DatabaseError>,
    pub usable: bool,
    pub live_results: usize,
    pub released: usize,
    pub deallocated: Vec<String>,
    pub executions: usize,
}

impl MockSession {
    pub fn new() -> Self {
        Self { usable: true, ..Default::default() }
    }

    /// Register canned statement.
    pub fn statement(
        &mut self,
        sql: &str,
        info: StatementInfo,
        handler: impl Fn(&[Option<Value>]) -> Result<MockResult, DatabaseError> + 'static,
    ) {
        self.statements.insert(sql.into(), Statement { info, handler: Some(Box::new(handler)) });
    }

    /// Any preparation of `sql` fails with syntax error.
    pub fn reject(&mut self, sql: &str) {
        self.rejected.insert(sql.into());
    }

    /// Next execution fails with `error`.
    pub fn fail_next_execute(&mut self, error: DatabaseError) {
        self.fail_next_execute = Some(error);
    }

    /// Currently registered statement names.
    pub fn prepared(&self) -> usize {
        self.prepared.len()
    }
}

impl Session for MockSession {
    type NativeResult = MockResult;

    fn register_prepared(&mut self, name: &StatementName, sql: &str) -> Result<StatementInfo> {
        if self.prepared.contains_key(name.as_str()) {
            return Err(DatabaseError::new(
                "42P05",
                format!("prepared statement \"{name}\" already exists"),
            )
            .into());
        }
        if self.rejected.contains(sql) {
            return Err(DatabaseError::new("42601", "syntax error at or near \"FROM\"").into());
        }

        let info = match self.statements.get(sql) {
            Some(stmt) => stmt.info.clone(),
            None => StatementInfo {
                param_types: vec![oid::UNSPECIFIED; crate::sql::count_placeholders(sql)],
                columns: vec![],
            },
        };
        self.prepared.insert(name.as_str().into(), sql.into());
        Ok(info)
    }

    fn bind_and_execute(
        &mut self,
        name: &StatementName,
        param_types: &[Oid],
        params: &[InputParameter<'_>],
    ) -> Result<Self::NativeResult> {
        let Some(sql) = self.prepared.get(name.as_str()) else {
            return Err(DatabaseError::new(
                "26000",
                format!("prepared statement \"{name}\" does not exist"),
            )
            .into());
        };
        if let Some(err) = self.fail_next_execute.take() {
            return Err(err.into());
        }
        if param_types.len() != params.len() {
            return Err(DatabaseError::new("08P01", "bind message parameter count mismatch").into());
        }

        let encoded = params
            .iter()
            .zip(param_types)
            .map(|(param, &ty)| (param.sql_type(), param.encode_for(ty)))
            .collect::<Vec<_>>();

        let result = match self.statements.get(sql).and_then(|stmt| stmt.handler.as_ref()) {
            Some(handler) => {
                // decode parameters the way server input functions would
                let values = encoded
                    .iter()
                    .map(|(sql_type, encoded)| -> Result<Option<Value>> {
                        let Some(value) = &encoded.value else {
                            return Ok(None);
                        };
                        let value = match encoded.format {
                            PgFormat::Binary => {
                                Value::from_binary(sql_type.oid(), Bytes::copy_from_slice(value))?
                            }
                            PgFormat::Text => Value::Text(
                                String::from_utf8(value.to_vec()).map_err(DecodeError::from)?,
                            ),
                        };
                        Ok(Some(value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                handler(&values)?
            }
            None => {
                let columns = encoded
                    .iter()
                    .enumerate()
                    .map(|(i, (sql_type, encoded))| {
                        let sql_type = match encoded.format {
                            PgFormat::Binary => *sql_type,
                            PgFormat::Text => SqlType::Text,
                        };
                        MetaColumn::new(i, format!("?column{i}?"), sql_type)
                    })
                    .collect();
                let row = RawRow::from_values(encoded.iter().map(|(_, e)| e.value.as_deref()));
                MockResult::rows(columns, vec![row])
            }
        };

        self.executions += 1;
        self.live_results += 1;
        Ok(result)
    }

    fn describe_result(&self, result: &Self::NativeResult) -> Vec<MetaColumn> {
        result.columns.clone()
    }

    fn affected_row_count(&self, result: &Self::NativeResult) -> u64 {
        result.affected
    }

    fn fetch_next_row(&self, result: &Self::NativeResult, cursor: usize) -> Option<RawRow> {
        result.rows.get(cursor).cloned()
    }

    fn release_result(&mut self, _: Self::NativeResult) {
        self.live_results -= 1;
        self.released += 1;
    }

    fn deallocate(&mut self, name: &StatementName) -> Result<()> {
        if !self.usable {
            return Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into());
        }
        self.prepared.remove(name.as_str());
        self.deallocated.push(name.as_str().into());
        Ok(())
    }

    fn is_usable(&self) -> bool {
        self.usable
    }

    fn server_info(&self) -> String {
        "Process ID: 0 Protocol Version: 3".into()
    }

    fn server_version(&self) -> i32 {
        160_002
    }

    fn host_info(&self) -> String {
        "mock".into()
    }

    fn session_encoding(&self) -> String {
        "UTF8".into()
    }
}
