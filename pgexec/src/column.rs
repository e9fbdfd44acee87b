//! Result column metadata and output values.
//!
//! - [`MetaColumn`]
//! - [`OutputParameter`]
use bytes::Bytes;

use crate::{
    decode::{Decode, DecodeError},
    postgres::{Oid, backend::FieldDescription, oid},
    types::SqlType,
    value::Value,
};

/// Metadata of one result column.
///
/// Postgres row description does not report nullability, columns are reported nullable
/// unless constructed otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaColumn {
    name: String,
    position: usize,
    sql_type: SqlType,
    oid: Oid,
    length: i32,
    precision: u32,
    scale: u32,
    nullable: bool,
}

impl MetaColumn {
    /// Create column metadata with unknown size.
    pub fn new(position: usize, name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            position,
            sql_type,
            oid: sql_type.oid(),
            length: sql_type.fixed_len().unwrap_or(-1),
            precision: 0,
            scale: 0,
            nullable: true,
        }
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Metadata from server row description.
    ///
    /// `varchar(n)` and `bpchar(n)` report `n` as length, `numeric(p,s)` report precision
    /// and scale, both decoded from the type modifier.
    pub(crate) fn from_field(position: usize, field: &FieldDescription) -> Self {
        let sql_type = SqlType::from_oid(field.type_oid);
        let mut me = Self::new(position, field.name.clone(), sql_type);
        me.oid = field.type_oid;
        me.length = match field.type_size {
            size if size > 0 => size.into(),
            _ => -1,
        };

        // modifier include the 4 bytes varlena header
        let typmod = field.type_modifier;
        match field.type_oid {
            oid::VARCHAR | oid::BPCHAR if typmod >= 4 => me.length = typmod - 4,
            oid::NUMERIC if typmod >= 4 => {
                let typmod = (typmod - 4) as u32;
                me.precision = (typmod >> 16) & 0xffff;
                me.scale = typmod & 0xffff;
            }
            _ => { },
        }

        me
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero based column position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Declared portable type.
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Postgres type oid as reported by server.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Size hint, `-1` if variable or unknown.
    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

/// Decoded value of one result column in the current row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputParameter {
    sql_type: SqlType,
    value: Option<Value>,
    length: usize,
}

impl OutputParameter {
    pub(crate) fn new(sql_type: SqlType, value: Option<Value>) -> Self {
        Self { sql_type, value, length: 0 }
    }

    /// Slot before any row is fetched.
    pub(crate) fn unset(meta: &MetaColumn) -> Self {
        Self::new(meta.sql_type(), None)
    }

    /// Decode binary wire value per declared column type.
    pub(crate) fn decode(meta: &MetaColumn, value: Option<Bytes>) -> Result<Self, DecodeError> {
        let Some(value) = value else {
            return Ok(Self::unset(meta));
        };
        let length = value.len();
        let value = Value::from_binary(meta.oid(), value)?;
        Ok(Self { sql_type: meta.sql_type(), value: Some(value), length })
    }

    /// Returns `true` if value is NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Byte length of the wire value, zero for NULL.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if wire value is empty or NULL.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Declared type of the column.
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Returns [`None`] if value is NULL.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consume self into the inner value.
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Try extract value as `T`.
    pub fn get<T: Decode>(&self) -> Result<T, DecodeError> {
        T::decode(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn field(type_oid: Oid, type_size: i16, type_modifier: i32) -> FieldDescription {
        FieldDescription {
            name: "c".into(),
            table_oid: 0,
            column_id: 0,
            type_oid,
            type_size,
            type_modifier,
            format_code: 1,
        }
    }

    #[test]
    fn metadata_from_field() {
        let meta = MetaColumn::from_field(0, &field(oid::VARCHAR, -1, 36));
        assert_eq!(meta.sql_type(), SqlType::Text);
        assert_eq!(meta.length(), 32);
        assert!(meta.nullable());

        let meta = MetaColumn::from_field(1, &field(oid::NUMERIC, -1, (10 << 16 | 2) + 4));
        assert_eq!(meta.precision(), 10);
        assert_eq!(meta.scale(), 2);
        assert_eq!(meta.length(), -1);
        assert_eq!(meta.position(), 1);

        let meta = MetaColumn::from_field(2, &field(oid::INT8, 8, -1));
        assert_eq!(meta.length(), 8);

        let meta = MetaColumn::from_field(3, &field(oid::TEXT, -1, -1));
        assert_eq!(meta.length(), -1);
    }

    #[test]
    fn decode_output() {
        let meta = MetaColumn::new(0, "a", SqlType::Int32);
        let out = OutputParameter::decode(&meta, Some(Bytes::from_static(&[0, 0, 1, 0]))).unwrap();
        assert!(!out.is_null());
        assert_eq!(out.len(), 4);
        assert_eq!(out.get::<i32>().unwrap(), 256);

        let out = OutputParameter::decode(&meta, None).unwrap();
        assert!(out.is_null());
        assert_eq!(out.len(), 0);
    }
}
