//! The [`StatementExecutor`] state machine.
//!
//! - `Inited`, `prepare` moves to `Compiled`
//! - `Compiled`, `bind_params` stages parameters, `execute` moves to `Executed`
//! - `Executed`, `fetch` advances the cursor, `execute` runs again
//!
//! Failed `execute` moves back to `Compiled`, `prepare` in any state starts a fresh cycle.
use std::{fmt, mem};

use crate::{
    Result,
    column::{MetaColumn, OutputParameter},
    common::{span, verbose, warning},
    decode::Decode,
    error::Error,
    param::{Encode, InputParameter},
    postgres::{Oid, ProtocolError},
    session::Session,
    sql::count_placeholders,
    types::SqlType,
    statement::StatementName,
};

/// Lifecycle state of a [`StatementExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No statement is prepared.
    Inited,
    /// Statement is prepared, parameters may be bound.
    Compiled,
    /// Statement is executed, rows may be fetched.
    Executed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Inited => "Inited",
            State::Compiled => "Compiled",
            State::Executed => "Executed",
        })
    }
}

#[derive(Debug)]
struct Prepared {
    name: StatementName,
    sql: String,
    placeholders: usize,
    param_types: Vec<Oid>,
    columns: Vec<MetaColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeFirst,
    At(usize),
    Exhausted,
}

#[derive(Debug)]
struct Executed<R> {
    result: R,
    columns: Vec<MetaColumn>,
    outputs: Vec<OutputParameter>,
    cursor: Cursor,
    affected: u64,
}

#[derive(Debug)]
enum Phase<R> {
    Inited,
    Compiled(Prepared),
    Executed(Prepared, Executed<R>),
    /// Only observable while a transition is in progress.
    Invalid,
}

impl<R> Default for Phase<R> {
    fn default() -> Self {
        Self::Invalid
    }
}

/// Prepared statement lifecycle on one connection.
///
/// The executor registers a uniquely named prepared statement on [`prepare`], stages typed
/// parameters on [`bind_params`], runs the statement on [`execute`], and exposes rows one
/// at a time with [`fetch`].
///
/// Parameters may borrow caller memory for `'p`, the borrow checker enforce that the
/// memory outlives the executor.
///
/// On drop, the current result is released and the prepared statement is deallocated
/// if the session is still usable.
///
/// [`prepare`]: StatementExecutor::prepare
/// [`bind_params`]: StatementExecutor::bind_params
/// [`execute`]: StatementExecutor::execute
/// [`fetch`]: StatementExecutor::fetch
pub struct StatementExecutor<'p, S: Session> {
    session: S,
    phase: Phase<S::NativeResult>,
    params: Vec<InputParameter<'p>>,
}

impl<'p, S: Session> StatementExecutor<'p, S> {
    /// Create executor bound to a session.
    pub fn new(session: S) -> Self {
        Self { session, phase: Phase::Inited, params: vec![] }
    }

    /// Register `sql` as a server side prepared statement.
    ///
    /// Any previous statement is discarded first, its result released and it is
    /// deallocated. On server rejection, returns [`ErrorKind::Preparation`][crate::ErrorKind]
    /// and state is [`State::Inited`].
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        span!("prepare");
        self.reset();

        let placeholders = count_placeholders(sql);
        let name = StatementName::next();
        let info = self.session.register_prepared(&name, sql).map_err(Error::preparation)?;

        verbose!(%name, placeholders, params = info.param_types.len(), columns = info.columns.len(), "prepared");

        self.phase = Phase::Compiled(Prepared {
            name,
            sql: sql.into(),
            placeholders,
            param_types: info.param_types,
            columns: info.columns,
        });
        Ok(())
    }

    /// Stage parameters for the next [`execute`][StatementExecutor::execute].
    ///
    /// Parameter count must equal the placeholder count, and each value must be
    /// convertible to its described placeholder type, otherwise returns
    /// [`ErrorKind::Bind`][crate::ErrorKind] and previously staged parameters are kept.
    /// This does not contact the server.
    pub fn bind_params<I>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Encode<'p>,
    {
        let prepared = match &self.phase {
            Phase::Compiled(prepared) | Phase::Executed(prepared, _) => prepared,
            _ => return Err(StateError::new("bind_params", self.state()).into()),
        };

        let params = params.into_iter().map(Encode::encode).collect::<Vec<_>>();
        let expected = prepared.placeholders;
        if params.len() != expected {
            return Err(BindError::Count { expected, found: params.len() }.into());
        }

        for (index, (param, &target)) in params.iter().zip(&prepared.param_types).enumerate() {
            if !param.bindable_to(target) {
                return Err(BindError::Type {
                    index,
                    expected: SqlType::from_oid(target),
                    found: param.sql_type(),
                }
                .into());
            }
        }

        verbose!(params = params.len(), "bind");
        self.params = params;
        Ok(())
    }

    /// Execute the prepared statement with staged parameters.
    ///
    /// Prior result is released. On server failure, returns
    /// [`ErrorKind::Execution`][crate::ErrorKind] and state is [`State::Compiled`],
    /// execution may be retried.
    pub fn execute(&mut self) -> Result<()> {
        span!("execute");

        let expected = match &self.phase {
            Phase::Compiled(prepared) | Phase::Executed(prepared, _) => prepared.placeholders,
            _ => return Err(StateError::new("execute", self.state()).into()),
        };
        if self.params.len() != expected {
            return Err(BindError::Count { expected, found: self.params.len() }.into());
        }

        let prepared = match mem::take(&mut self.phase) {
            Phase::Compiled(prepared) => prepared,
            Phase::Executed(prepared, executed) => {
                self.session.release_result(executed.result);
                prepared
            }
            Phase::Inited | Phase::Invalid => unreachable!("state checked above"),
        };

        let result = match self.session.bind_and_execute(
            &prepared.name,
            &prepared.param_types,
            &self.params,
        ) {
            Ok(ok) => ok,
            Err(err) => {
                self.phase = Phase::Compiled(prepared);
                return Err(err.execution());
            }
        };

        let columns = self.session.describe_result(&result);
        let affected = self.session.affected_row_count(&result);
        let outputs = columns.iter().map(OutputParameter::unset).collect();

        verbose!(name = %prepared.name, columns = columns.len(), affected, "executed");

        self.phase = Phase::Executed(prepared, Executed {
            result,
            columns,
            outputs,
            cursor: Cursor::BeforeFirst,
            affected,
        });
        Ok(())
    }

    /// Advance to the next row and decode every column.
    ///
    /// Returns `false` when result is exhausted, subsequent calls keep returning `false`.
    ///
    /// On decode failure the row is consumed and every output slot is reset to NULL.
    pub fn fetch(&mut self) -> Result<bool> {
        let Phase::Executed(_, executed) = &mut self.phase else {
            return Err(StateError::new("fetch", self.state()).into());
        };

        let next = match executed.cursor {
            Cursor::BeforeFirst => 0,
            Cursor::At(i) => i + 1,
            Cursor::Exhausted => return Ok(false),
        };

        let Some(row) = self.session.fetch_next_row(&executed.result, next) else {
            executed.cursor = Cursor::Exhausted;
            return Ok(false);
        };
        executed.cursor = Cursor::At(next);

        match decode_row(&executed.columns, row.values(), row.len()) {
            Ok(outputs) => {
                executed.outputs = outputs;
                Ok(true)
            }
            Err(err) => {
                executed.outputs = executed.columns.iter().map(OutputParameter::unset).collect();
                Err(err)
            }
        }
    }

    /// Discard current statement, returning to [`State::Inited`].
    ///
    /// Current result is released and the statement is deallocated if the session is
    /// usable. Deallocation failure is logged and ignored.
    pub fn reset(&mut self) {
        let prepared = match mem::replace(&mut self.phase, Phase::Inited) {
            Phase::Compiled(prepared) => Some(prepared),
            Phase::Executed(prepared, executed) => {
                self.session.release_result(executed.result);
                Some(prepared)
            }
            Phase::Inited | Phase::Invalid => None,
        };
        self.params.clear();

        let Some(prepared) = prepared else {
            return;
        };
        if !self.session.is_usable() {
            warning!("session is unusable, skip deallocating `{}`", prepared.name);
            return;
        }
        if let Err(_err) = self.session.deallocate(&prepared.name) {
            warning!("failed to deallocate `{}`: {_err}", prepared.name);
        }
    }

    /// Number of result columns, zero unless [`State::Executed`].
    pub fn columns_returned(&self) -> usize {
        match &self.phase {
            Phase::Executed(_, executed) => executed.columns.len(),
            _ => 0,
        }
    }

    /// Metadata of result column `index`.
    pub fn meta_column(&self, index: usize) -> Result<&MetaColumn> {
        let columns: &[MetaColumn] = match &self.phase {
            Phase::Executed(_, executed) => &executed.columns,
            _ => &[],
        };
        columns.get(index).ok_or_else(|| IndexError { index, len: columns.len() }.into())
    }

    /// Value of result column `index` in the current row.
    pub fn result_column(&self, index: usize) -> Result<&OutputParameter> {
        let outputs: &[OutputParameter] = match &self.phase {
            Phase::Executed(_, executed) => &executed.outputs,
            _ => &[],
        };
        outputs.get(index).ok_or_else(|| IndexError { index, len: outputs.len() }.into())
    }

    /// Decode result column `index` in the current row as `T`.
    pub fn get<T: Decode>(&self, index: usize) -> Result<T> {
        Ok(self.result_column(index)?.get()?)
    }

    /// Rows affected by the last execution.
    pub fn affected_row_count(&self) -> Result<u64> {
        match &self.phase {
            Phase::Executed(_, executed) => Ok(executed.affected),
            _ => Err(StateError::new("affected_row_count", self.state()).into()),
        }
    }

    pub fn state(&self) -> State {
        match &self.phase {
            Phase::Inited | Phase::Invalid => State::Inited,
            Phase::Compiled(_) => State::Compiled,
            Phase::Executed(..) => State::Executed,
        }
    }

    /// Statement text of the prepared statement.
    pub fn sql(&self) -> Option<&str> {
        self.prepared().map(|p| p.sql.as_str())
    }

    /// Server side name of the prepared statement.
    pub fn prepared_name(&self) -> Option<&StatementName> {
        self.prepared().map(|p| &p.name)
    }

    /// Number of parameter placeholders in the prepared statement.
    pub fn placeholder_count(&self) -> usize {
        self.prepared().map_or(0, |p| p.placeholders)
    }

    /// Parameter types described by server.
    pub fn param_types(&self) -> &[Oid] {
        self.prepared().map_or(&[][..], |p| &p.param_types[..])
    }

    /// Result columns described by server at preparation.
    pub fn statement_columns(&self) -> &[MetaColumn] {
        self.prepared().map_or(&[][..], |p| &p.columns[..])
    }

    /// Currently staged parameters.
    pub fn params(&self) -> &[InputParameter<'p>] {
        &self.params
    }

    /// The session native result of the last execution.
    pub fn native_result(&self) -> Option<&S::NativeResult> {
        match &self.phase {
            Phase::Executed(_, executed) => Some(&executed.result),
            _ => None,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn prepared(&self) -> Option<&Prepared> {
        match &self.phase {
            Phase::Compiled(prepared) | Phase::Executed(prepared, _) => Some(prepared),
            _ => None,
        }
    }
}

fn decode_row(
    columns: &[MetaColumn],
    values: impl Iterator<Item = Result<Option<bytes::Bytes>, ProtocolError>>,
    len: usize,
) -> Result<Vec<OutputParameter>> {
    if len != columns.len() {
        return Err(ProtocolError::malformed("row length does not match result columns").into());
    }
    columns
        .iter()
        .zip(values)
        .map(|(meta, value)| Ok(OutputParameter::decode(meta, value?)?))
        .collect()
}

impl<S: Session> Drop for StatementExecutor<'_, S> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<S: Session> fmt::Debug for StatementExecutor<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementExecutor")
            .field("state", &self.state())
            .field("name", &self.prepared_name())
            .field("sql", &self.sql())
            .field("params", &self.params.len())
            .field("columns", &self.columns_returned())
            .finish()
    }
}

// ===== Errors =====

/// Parameters do not match the statement placeholders.
#[derive(Clone, PartialEq, Eq)]
pub enum BindError {
    /// Parameter count does not match placeholder count.
    Count { expected: usize, found: usize },
    /// Parameter at `index` cannot be converted to its placeholder type.
    Type { index: usize, expected: SqlType, found: SqlType },
}

/// Column index is out of range.
#[derive(Clone, PartialEq, Eq)]
pub struct IndexError {
    index: usize,
    len: usize,
}

impl IndexError {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Operation is not valid in current executor state.
#[derive(Clone, PartialEq, Eq)]
pub struct StateError {
    operation: &'static str,
    state: State,
}

impl StateError {
    fn new(operation: &'static str, state: State) -> Self {
        Self { operation, state }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn state(&self) -> State {
        self.state
    }
}

impl std::error::Error for BindError { }
impl std::error::Error for IndexError { }
impl std::error::Error for StateError { }

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { expected, found } => {
                write!(f, "statement expects {expected} parameters, {found} bound")
            }
            Self::Type { index, expected, found } => {
                write!(f, "parameter ${} of type `{found}` cannot bind to `{expected}`", index + 1)
            }
        }
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column index {} out of range for {} columns", self.index, self.len)
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not allowed in `{}` state", self.operation, self.state)
    }
}

impl fmt::Debug for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl fmt::Debug for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl fmt::Debug for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        ErrorKind, SqlType, Value,
        param::Numeric,
        postgres::{DatabaseError, oid},
        session::{
            RawRow, StatementInfo,
            mock::{MockResult, MockSession},
        },
    };

    const INSERT: &str = "INSERT INTO t(a) VALUES($1)";
    const SELECT: &str = "SELECT a,b FROM t WHERE a=$1";
    const SERIES: &str = "SELECT n FROM generate_series(1, $1) n";

    fn session() -> MockSession {
        let mut session = MockSession::new();

        session.statement(
            INSERT,
            StatementInfo { param_types: vec![oid::INT4], columns: vec![] },
            |_| Ok(MockResult::affected(1)),
        );

        let columns = vec![
            MetaColumn::new(0, "a", SqlType::Int32),
            MetaColumn::new(1, "b", SqlType::Text),
        ];
        session.statement(
            SELECT,
            StatementInfo { param_types: vec![oid::INT4], columns: columns.clone() },
            move |params| {
                let Some(Value::Int32(a)) = params[0] else {
                    return Ok(MockResult::rows(columns.clone(), vec![]));
                };
                let row = RawRow::from_values([Some(&a.to_be_bytes()[..]), Some(&b"forty two"[..])]);
                Ok(MockResult::rows(columns.clone(), vec![row]))
            },
        );

        let columns = vec![MetaColumn::new(0, "n", SqlType::Int64)];
        session.statement(
            SERIES,
            StatementInfo { param_types: vec![oid::INT8], columns: columns.clone() },
            move |params| {
                let Some(Value::Int64(n)) = params[0] else {
                    return Err(DatabaseError::new("22004", "null value not allowed"));
                };
                let rows = (1..=n)
                    .map(|i| RawRow::from_values([Some(&i.to_be_bytes()[..])]))
                    .collect();
                Ok(MockResult::rows(columns.clone(), rows))
            },
        );

        session
    }

    fn kind<T: fmt::Debug>(result: Result<T>) -> ErrorKind {
        result.unwrap_err().into_kind()
    }

    #[test]
    fn bind_count() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare("INSERT INTO t(a,b,c) VALUES($1,$2,$3)").unwrap();
        assert_eq!(exe.placeholder_count(), 3);

        let err = kind(exe.bind_params([1, 2]));
        assert!(matches!(err, ErrorKind::Bind(BindError::Count { expected: 3, found: 2 })));
        assert_eq!(exe.state(), State::Compiled);

        assert!(matches!(kind(exe.bind_params([1, 2, 3, 4])), ErrorKind::Bind(_)));
        assert_eq!(exe.state(), State::Compiled);

        exe.bind_params([1, 2, 3]).unwrap();
        assert_eq!(exe.state(), State::Compiled);
        assert_eq!(exe.params().len(), 3);
    }

    #[test]
    fn bind_type() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(INSERT).unwrap();
        exe.bind_params([7]).unwrap();

        let err = kind(exe.bind_params([vec![1u8, 2, 3]]));
        assert!(matches!(
            err,
            ErrorKind::Bind(BindError::Type { index: 0, expected: SqlType::Int32, found: SqlType::Bytea })
        ));
        assert_eq!(err.to_string(), "parameter $1 of type `bytea` cannot bind to `int4`");
        assert_eq!(exe.state(), State::Compiled);
        assert_eq!(exe.params()[0].sql_type(), SqlType::Int32);

        // converted by server input function
        exe.bind_params(["42"]).unwrap();
        exe.bind_params([42i64]).unwrap();
        exe.bind_params([None::<Vec<u8>>]).unwrap();
        exe.execute().unwrap();
        assert_eq!(exe.affected_row_count().unwrap(), 1);
    }

    #[test]
    fn bind_before_prepare() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        assert!(matches!(kind(exe.bind_params([1])), ErrorKind::State(_)));
        assert!(matches!(kind(exe.execute()), ErrorKind::State(_)));
        assert_eq!(exe.state(), State::Inited);
    }

    #[test]
    fn execute_without_bind() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(INSERT).unwrap();
        assert!(matches!(kind(exe.execute()), ErrorKind::Bind(_)));
        assert_eq!(exe.state(), State::Compiled);
    }

    #[test]
    fn fetch_before_execute() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);

        let ErrorKind::State(err) = kind(exe.fetch()) else {
            panic!("expected state error");
        };
        assert_eq!(err.operation(), "fetch");
        assert_eq!(err.state(), State::Inited);

        exe.prepare(SELECT).unwrap();
        let ErrorKind::State(err) = kind(exe.fetch()) else {
            panic!("expected state error");
        };
        assert_eq!(err.state(), State::Compiled);
        assert!(matches!(kind(exe.affected_row_count()), ErrorKind::State(_)));
    }

    #[test]
    fn fetch_exhaustion() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(SERIES).unwrap();
        exe.bind_params([3i64]).unwrap();
        exe.execute().unwrap();

        let mut seen = vec![];
        while exe.fetch().unwrap() {
            seen.push(exe.get::<i64>(0).unwrap());
        }
        assert_eq!(seen, [1, 2, 3]);
        assert!(!exe.fetch().unwrap());
        assert!(!exe.fetch().unwrap());
        assert_eq!(exe.affected_row_count().unwrap(), 3);

        // re-execute restart the cursor
        exe.bind_params([1i64]).unwrap();
        exe.execute().unwrap();
        assert!(exe.fetch().unwrap());
        assert!(!exe.fetch().unwrap());
    }

    #[test]
    fn column_index() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(SELECT).unwrap();
        assert!(matches!(kind(exe.meta_column(0)), ErrorKind::Index(_)));

        exe.bind_params([42]).unwrap();
        exe.execute().unwrap();
        assert_eq!(exe.columns_returned(), 2);

        for i in 0..exe.columns_returned() {
            assert_eq!(exe.meta_column(i).unwrap().position(), i);
            assert!(exe.result_column(i).unwrap().is_null());
        }

        let ErrorKind::Index(err) = kind(exe.meta_column(2)) else {
            panic!("expected index error");
        };
        assert_eq!(err.index(), 2);
        assert_eq!(err.len(), 2);
        assert!(matches!(kind(exe.result_column(2)), ErrorKind::Index(_)));
    }

    #[test]
    fn select_by_key() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(SELECT).unwrap();
        exe.bind_params([42]).unwrap();
        exe.execute().unwrap();

        assert_eq!(exe.state(), State::Executed);
        assert_eq!(exe.columns_returned(), 2);
        assert_eq!(exe.meta_column(0).unwrap().name(), "a");
        assert_eq!(exe.meta_column(1).unwrap().sql_type(), SqlType::Text);

        assert!(exe.fetch().unwrap());
        let a = exe.result_column(0).unwrap();
        assert!(!a.is_null());
        assert_eq!(a.len(), 4);
        assert_eq!(a.get::<i32>().unwrap(), 42);
        assert_eq!(exe.get::<String>(1).unwrap(), "forty two");
        assert!(!exe.fetch().unwrap());
    }

    #[test]
    fn insert_affected_rows() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(INSERT).unwrap();
        exe.bind_params([42]).unwrap();
        exe.execute().unwrap();
        assert_eq!(exe.affected_row_count().unwrap(), 1);
        assert_eq!(exe.columns_returned(), 0);
        assert!(!exe.fetch().unwrap());
    }

    #[test]
    fn round_trip() {
        let mut session = session();
        let text = String::from("borrowed text");
        let bytes = vec![0u8, 1, 2, 255];
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare("SELECT $1, $2, $3, $4, $5, $6").unwrap();
        exe.bind_params([
            true.encode(),
            i64::MIN.encode(),
            text.as_str().encode(),
            (&bytes).encode(),
            Numeric("12.50").encode(),
            None::<i32>.encode(),
        ])
        .unwrap();
        exe.execute().unwrap();
        assert!(exe.fetch().unwrap());

        assert!(exe.get::<bool>(0).unwrap());
        assert_eq!(exe.get::<i64>(1).unwrap(), i64::MIN);
        assert_eq!(exe.get::<String>(2).unwrap(), text);
        assert_eq!(exe.get::<Vec<u8>>(3).unwrap(), bytes);
        assert_eq!(exe.get::<String>(4).unwrap(), "12.50");

        for i in 0..5 {
            assert!(!exe.result_column(i).unwrap().is_null());
        }
        let null = exe.result_column(5).unwrap();
        assert!(null.is_null());
        assert_eq!(null.sql_type(), SqlType::Int32);
        assert_eq!(exe.get::<Option<i32>>(5).unwrap(), None);
    }

    #[test]
    fn type_mismatch() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(SELECT).unwrap();
        exe.bind_params([42]).unwrap();
        exe.execute().unwrap();
        exe.fetch().unwrap();

        let ErrorKind::TypeMismatch(err) = kind(exe.get::<String>(0)) else {
            panic!("expected type mismatch");
        };
        assert_eq!(err.declared(), SqlType::Int32);
        assert_eq!(exe.get::<i64>(0).unwrap(), 42);
    }

    #[test]
    fn reprepare_discards_result() {
        let mut session = session();
        {
            let mut exe = StatementExecutor::new(&mut session);
            exe.prepare(SELECT).unwrap();
            exe.bind_params([42]).unwrap();
            exe.execute().unwrap();
            assert_eq!(exe.columns_returned(), 2);
            let first = exe.prepared_name().unwrap().clone();

            exe.prepare(INSERT).unwrap();
            assert_eq!(exe.state(), State::Compiled);
            assert_eq!(exe.columns_returned(), 0);
            assert!(exe.native_result().is_none());
            assert!(exe.params().is_empty());
            assert_ne!(exe.prepared_name().unwrap(), &first);
            assert_eq!(exe.session().live_results, 0);
            assert_eq!(exe.session().deallocated, [first.as_str()]);

            exe.bind_params([1]).unwrap();
            exe.execute().unwrap();
            assert_eq!(exe.columns_returned(), 0);
            assert_eq!(exe.affected_row_count().unwrap(), 1);
        }
        assert_eq!(session.live_results, 0);
        assert_eq!(session.prepared(), 0);
    }

    #[test]
    fn preparation_error() {
        let mut session = session();
        session.reject("SELECT FROM FROM");
        let mut exe = StatementExecutor::new(&mut session);

        let err = exe.prepare("SELECT FROM FROM").unwrap_err();
        assert_eq!(err.database_error().unwrap().code(), "42601");
        assert!(matches!(err.kind(), ErrorKind::Preparation(_)));
        assert_eq!(exe.state(), State::Inited);

        exe.prepare(SELECT).unwrap();
        assert_eq!(exe.state(), State::Compiled);
    }

    #[test]
    fn execution_error() {
        let mut session = session();
        session.fail_next_execute(DatabaseError::new("23505", "duplicate key value"));
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(INSERT).unwrap();
        exe.bind_params([42]).unwrap();

        let err = exe.execute().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Execution(_)));
        assert_eq!(err.database_error().unwrap().code(), "23505");
        assert_eq!(exe.state(), State::Compiled);

        exe.execute().unwrap();
        assert_eq!(exe.state(), State::Executed);
        assert_eq!(exe.affected_row_count().unwrap(), 1);
    }

    #[test]
    fn handler_error_is_execution_error() {
        let mut session = session();
        let mut exe = StatementExecutor::new(&mut session);
        exe.prepare(SERIES).unwrap();
        exe.bind_params([None::<i64>]).unwrap();
        let err = exe.execute().unwrap_err();
        assert_eq!(err.database_error().unwrap().code(), "22004");
        assert_eq!(exe.state(), State::Compiled);
    }

    #[test]
    fn release_on_every_path() {
        let mut session = session();
        {
            let mut exe = StatementExecutor::new(&mut session);
            exe.prepare(SERIES).unwrap();
            exe.bind_params([2i64]).unwrap();
            exe.execute().unwrap();
            exe.execute().unwrap();
            assert_eq!(exe.session().live_results, 1);
        }
        assert_eq!(session.live_results, 0);
        assert_eq!(session.released, 2);
        assert_eq!(session.deallocated.len(), 1);
    }

    #[test]
    fn drop_unusable_session() {
        let mut session = session();
        {
            let mut exe = StatementExecutor::new(&mut session);
            exe.prepare(INSERT).unwrap();
            exe.bind_params([1]).unwrap();
            exe.execute().unwrap();
            exe.session.usable = false;
        }
        assert!(session.deallocated.is_empty());
        assert_eq!(session.live_results, 0);
        assert_eq!(session.prepared(), 1);
    }

    #[test]
    fn shared_session() {
        let session = RefCell::new(session());
        let mut a = StatementExecutor::new(&session);
        let mut b = StatementExecutor::new(&session);

        a.prepare(SERIES).unwrap();
        b.prepare(SELECT).unwrap();
        assert_ne!(a.prepared_name(), b.prepared_name());

        a.bind_params([2i64]).unwrap();
        b.bind_params([7]).unwrap();
        a.execute().unwrap();
        b.execute().unwrap();

        assert!(a.fetch().unwrap());
        assert!(b.fetch().unwrap());
        assert!(a.fetch().unwrap());
        assert_eq!(a.get::<i64>(0).unwrap(), 2);
        assert_eq!(b.get::<i32>(0).unwrap(), 7);
        assert!(!b.fetch().unwrap());

        drop(a);
        drop(b);
        let session = session.into_inner();
        assert_eq!(session.live_results, 0);
        assert_eq!(session.prepared(), 0);
    }

    #[test]
    fn diagnostics() {
        let mut session = session();
        let exe = StatementExecutor::new(&mut session);
        assert_eq!(exe.session().server_version(), 160_002);
        assert_eq!(exe.session().session_encoding(), "UTF8");
        assert_eq!(exe.sql(), None);
        assert_eq!(exe.placeholder_count(), 0);
    }
}
