//! Connection handle boundary.
//!
//! [`StatementExecutor`][crate::StatementExecutor] does not own a live connection, it
//! drives any [`Session`] implementation. [`Connection`][crate::Connection] is the
//! postgres implementation.
use bytes::{Buf, Bytes, BufMut, BytesMut};
use std::cell::RefCell;

use crate::{
    Result,
    column::MetaColumn,
    ext::{BytesExt, UsizeExt},
    param::InputParameter,
    postgres::{Oid, ProtocolError, backend::DataRow},
    statement::StatementName,
};

#[cfg(test)]
pub(crate) mod mock;

/// Server description of a prepared statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementInfo {
    /// Parameter types inferred by server, one per placeholder.
    pub param_types: Vec<Oid>,
    /// Result columns, empty if statement returns no rows.
    pub columns: Vec<MetaColumn>,
}

/// One undecoded row, in `DataRow` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    len: u16,
    body: Bytes,
}

impl RawRow {
    /// Wrap `DataRow` message body.
    pub fn new(mut body: Bytes) -> Result<Self, ProtocolError> {
        let len = body.try_get_u16()?;
        Ok(Self { len, body })
    }

    pub(crate) fn from_data_row(row: DataRow) -> Self {
        Self { len: row.column_len, body: row.body }
    }

    /// Build row from column values, [`None`] is NULL.
    pub fn from_values<'a>(values: impl IntoIterator<Item = Option<&'a [u8]>>) -> Self {
        let mut len = 0usize;
        let mut body = BytesMut::new();
        for value in values {
            match value {
                Some(value) => {
                    body.put_i32(value.len().to_u32() as i32);
                    body.put_slice(value);
                }
                None => body.put_i32(-1),
            }
            len += 1;
        }
        Self { len: len.to_u16(), body: body.freeze() }
    }

    /// Number of columns in this row.
    pub fn len(&self) -> usize {
        self.len.into()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate column values, [`None`] is NULL.
    pub fn values(&self) -> RawValues {
        RawValues { remaining: self.len, body: self.body.clone() }
    }
}

/// Iterator returned by [`RawRow::values`].
#[derive(Debug)]
pub struct RawValues {
    remaining: u16,
    body: Bytes,
}

impl Iterator for RawValues {
    type Item = Result<Option<Bytes>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let value = match self.body.try_get_i32() {
            Ok(-1) => Ok(None),
            Ok(len) if len < 0 => Err(ProtocolError::malformed("negative value length")),
            Ok(len) => self.body.try_split_to(len as usize).map(Some),
            Err(err) => Err(err.into()),
        };
        if value.is_err() {
            self.remaining = 0;
            self.body.advance(self.body.remaining());
        }
        Some(value)
    }
}

/// Connection handle used by statement executor.
///
/// The executor calls these in protocol order, and exclusively owns every
/// [`NativeResult`][Session::NativeResult] it receives until it gives it back to
/// [`release_result`][Session::release_result].
pub trait Session {
    /// Result of one execution, owned by the executor.
    type NativeResult;

    /// Register prepared statement `name` for `sql`, and describe its parameter and result types.
    fn register_prepared(&mut self, name: &StatementName, sql: &str) -> Result<StatementInfo>;

    /// Bind parameters to statement `name` and execute it.
    ///
    /// `param_types` is the server described parameter types returned by
    /// [`register_prepared`][Session::register_prepared].
    fn bind_and_execute(
        &mut self,
        name: &StatementName,
        param_types: &[Oid],
        params: &[InputParameter<'_>],
    ) -> Result<Self::NativeResult>;

    /// Result columns of an execution result.
    fn describe_result(&self, result: &Self::NativeResult) -> Vec<MetaColumn>;

    /// Rows affected by an execution result.
    fn affected_row_count(&self, result: &Self::NativeResult) -> u64;

    /// Row at `cursor`, [`None`] when result is exhausted.
    fn fetch_next_row(&self, result: &Self::NativeResult, cursor: usize) -> Option<RawRow>;

    /// Release resources held by an execution result.
    fn release_result(&mut self, result: Self::NativeResult);

    /// Deallocate prepared statement `name`.
    fn deallocate(&mut self, name: &StatementName) -> Result<()>;

    /// Returns `false` if connection is broken or closed.
    fn is_usable(&self) -> bool;

    fn server_info(&self) -> String;

    /// Numeric server version, `160002` for `16.2`.
    fn server_version(&self) -> i32;

    fn host_info(&self) -> String;

    fn session_encoding(&self) -> String;
}

impl<S: Session> Session for &mut S {
    type NativeResult = S::NativeResult;

    fn register_prepared(&mut self, name: &StatementName, sql: &str) -> Result<StatementInfo> {
        S::register_prepared(self, name, sql)
    }

    fn bind_and_execute(
        &mut self,
        name: &StatementName,
        param_types: &[Oid],
        params: &[InputParameter<'_>],
    ) -> Result<Self::NativeResult> {
        S::bind_and_execute(self, name, param_types, params)
    }

    fn describe_result(&self, result: &Self::NativeResult) -> Vec<MetaColumn> {
        S::describe_result(self, result)
    }

    fn affected_row_count(&self, result: &Self::NativeResult) -> u64 {
        S::affected_row_count(self, result)
    }

    fn fetch_next_row(&self, result: &Self::NativeResult, cursor: usize) -> Option<RawRow> {
        S::fetch_next_row(self, result, cursor)
    }

    fn release_result(&mut self, result: Self::NativeResult) {
        S::release_result(self, result)
    }

    fn deallocate(&mut self, name: &StatementName) -> Result<()> {
        S::deallocate(self, name)
    }

    fn is_usable(&self) -> bool {
        S::is_usable(self)
    }

    fn server_info(&self) -> String {
        S::server_info(self)
    }

    fn server_version(&self) -> i32 {
        S::server_version(self)
    }

    fn host_info(&self) -> String {
        S::host_info(self)
    }

    fn session_encoding(&self) -> String {
        S::session_encoding(self)
    }
}

/// Multiple executors sharing one connection.
///
/// Each call borrow the connection for its duration only, traffic is serialized
/// by the single threaded borrow.
impl<S: Session> Session for &RefCell<S> {
    type NativeResult = S::NativeResult;

    fn register_prepared(&mut self, name: &StatementName, sql: &str) -> Result<StatementInfo> {
        self.borrow_mut().register_prepared(name, sql)
    }

    fn bind_and_execute(
        &mut self,
        name: &StatementName,
        param_types: &[Oid],
        params: &[InputParameter<'_>],
    ) -> Result<Self::NativeResult> {
        self.borrow_mut().bind_and_execute(name, param_types, params)
    }

    fn describe_result(&self, result: &Self::NativeResult) -> Vec<MetaColumn> {
        self.borrow().describe_result(result)
    }

    fn affected_row_count(&self, result: &Self::NativeResult) -> u64 {
        self.borrow().affected_row_count(result)
    }

    fn fetch_next_row(&self, result: &Self::NativeResult, cursor: usize) -> Option<RawRow> {
        self.borrow().fetch_next_row(result, cursor)
    }

    fn release_result(&mut self, result: Self::NativeResult) {
        self.borrow_mut().release_result(result)
    }

    fn deallocate(&mut self, name: &StatementName) -> Result<()> {
        self.borrow_mut().deallocate(name)
    }

    fn is_usable(&self) -> bool {
        self.borrow().is_usable()
    }

    fn server_info(&self) -> String {
        self.borrow().server_info()
    }

    fn server_version(&self) -> i32 {
        self.borrow().server_version()
    }

    fn host_info(&self) -> String {
        self.borrow().host_info()
    }

    fn session_encoding(&self) -> String {
        self.borrow().session_encoding()
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::RawRow;

    #[test]
    fn raw_row_values() {
        let row = RawRow::from_values([Some(&b"ab"[..]), None, Some(&b""[..])]);
        assert_eq!(row.len(), 3);
        let values = row.values().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(values, [Some(Bytes::from_static(b"ab")), None, Some(Bytes::new())]);
    }

    #[test]
    fn truncated_row() {
        let row = RawRow::new(Bytes::from_static(&[0, 2, 0, 0, 0, 4, b'a'])).unwrap();
        let mut values = row.values();
        assert!(values.next().unwrap().is_err());
        assert!(values.next().is_none());
    }
}
