//! Input parameter binding.
//!
//! - [`InputParameter`]
//! - [`Encode`]
use std::borrow::Cow;

use crate::{
    postgres::{Oid, PgFormat, frontend::Encoded, oid},
    types::SqlType,
    value::ValueRef,
};

/// Typed input parameter bound to a statement placeholder.
///
/// Variable length payload may borrow caller memory for `'a`, the executor holding
/// the parameter cannot outlive it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputParameter<'a> {
    sql_type: SqlType,
    value: Option<ValueRef<'a>>,
}

impl<'a> InputParameter<'a> {
    /// Create non-null parameter.
    pub fn new(value: ValueRef<'a>) -> Self {
        Self { sql_type: value.sql_type(), value: Some(value) }
    }

    /// Create NULL parameter of declared type.
    pub fn null(sql_type: SqlType) -> Self {
        Self { sql_type, value: None }
    }

    /// Returns `true` if parameter is NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn value(&self) -> Option<&ValueRef<'a>> {
        self.value.as_ref()
    }

    /// Returns `true` if this parameter can be bound to a placeholder of `target` type.
    ///
    /// NULL binds to anything. Non-binary compatible values are sent as text, so only
    /// type families the server input function never accepts are rejected.
    pub(crate) fn bindable_to(&self, target: Oid) -> bool {
        self.value.is_none() || convertible(self.sql_type, SqlType::from_oid(target))
    }

    /// Encode for the parameter type described by server.
    ///
    /// Binary format is used when the value's natural type is binary compatible
    /// with `target`, otherwise fallback to text format and let server input function
    /// convert it.
    pub(crate) fn encode_for(&self, target: Oid) -> Encoded<'_> {
        let Some(value) = &self.value else {
            return Encoded { format: PgFormat::Binary, value: None };
        };

        if binary_compatible(value.sql_type(), target) {
            if let Some(binary) = value.binary() {
                return Encoded { format: PgFormat::Binary, value: Some(binary) };
            }
        }

        let text = match value.text() {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        };
        Encoded { format: PgFormat::Text, value: Some(text) }
    }
}

fn binary_compatible(natural: SqlType, target: Oid) -> bool {
    match target {
        oid::UNSPECIFIED => true,
        target => natural == SqlType::from_oid(target) && natural != SqlType::Json,
    }
}

fn convertible(natural: SqlType, target: SqlType) -> bool {
    use SqlType::*;
    match (natural, target) {
        _ if natural == target => true,
        (Text | Unknown(_), _) | (_, Text | Unknown(_)) => true,
        (
            Int16 | Int32 | Int64 | Float32 | Float64 | Numeric | Oid,
            Int16 | Int32 | Int64 | Float32 | Float64 | Numeric | Oid,
        ) => true,
        (Date | Timestamp | TimestampTz, Date | Timestamp | TimestampTz) => true,
        _ => false,
    }
}

/// A type that can be bound as [`InputParameter`].
pub trait Encode<'a> {
    /// Declared type, used for NULL parameter.
    const SQL_TYPE: SqlType;

    /// Encode self into input parameter.
    fn encode(self) -> InputParameter<'a>;
}

impl<'a> From<ValueRef<'a>> for InputParameter<'a> {
    fn from(value: ValueRef<'a>) -> Self {
        Self::new(value)
    }
}

impl<'a, T: Encode<'a>> Encode<'a> for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn encode(self) -> InputParameter<'a> {
        match self {
            Some(value) => value.encode(),
            None => InputParameter::null(T::SQL_TYPE),
        }
    }
}

impl<'a> Encode<'a> for InputParameter<'a> {
    const SQL_TYPE: SqlType = SqlType::Unknown(oid::UNSPECIFIED);

    fn encode(self) -> InputParameter<'a> {
        self
    }
}

macro_rules! encode {
    (<$lf:lifetime> $ty:ty, $sql:ident, $v:pat => $body:expr) => {
        impl<$lf> Encode<$lf> for $ty {
            const SQL_TYPE: SqlType = SqlType::$sql;

            fn encode(self) -> InputParameter<$lf> {
                let $v = self;
                InputParameter::new($body)
            }
        }
    };
    ($ty:ty, $sql:ident, $v:pat => $body:expr) => {
        encode!(<'a> $ty, $sql, $v => $body);
    };
}

encode!(bool, Bool, v => ValueRef::Bool(v));
encode!(i16, Int16, v => ValueRef::Int16(v));
encode!(i32, Int32, v => ValueRef::Int32(v));
encode!(i64, Int64, v => ValueRef::Int64(v));
encode!(f32, Float32, v => ValueRef::Float32(v));
encode!(f64, Float64, v => ValueRef::Float64(v));
encode!(u32, Oid, v => ValueRef::Oid(v));
encode!([u8; 16], Uuid, v => ValueRef::Uuid(v));
encode!(<'a> &'a str, Text, v => ValueRef::Text(Cow::Borrowed(v)));
encode!(<'a> &'a String, Text, v => ValueRef::Text(Cow::Borrowed(v.as_str())));
encode!(String, Text, v => ValueRef::Text(Cow::Owned(v)));
encode!(<'a> &'a [u8], Bytea, v => ValueRef::Bytea(Cow::Borrowed(v)));
encode!(<'a> &'a Vec<u8>, Bytea, v => ValueRef::Bytea(Cow::Borrowed(v.as_slice())));
encode!(Vec<u8>, Bytea, v => ValueRef::Bytea(Cow::Owned(v)));

#[cfg(feature = "time")]
encode!(time::Date, Date, v => ValueRef::Date(v));
#[cfg(feature = "time")]
encode!(time::Time, Time, v => ValueRef::Time(v));
#[cfg(feature = "time")]
encode!(time::PrimitiveDateTime, Timestamp, v => ValueRef::Timestamp(v));
#[cfg(feature = "time")]
encode!(time::UtcDateTime, TimestampTz, v => ValueRef::TimestampTz(v));

#[cfg(feature = "json")]
encode!(serde_json::Value, Json, v => ValueRef::Json(Cow::Owned(v.to_string())));

/// Decimal text bound as `numeric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numeric<'a>(pub &'a str);

encode!(<'a> Numeric<'a>, Numeric, Numeric(v) => ValueRef::Numeric(Cow::Borrowed(v)));
