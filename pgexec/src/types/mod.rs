//! Portable type universe and integration with external types.
//!
//! [`SqlType`] is the declared type of a parameter or result column, mapped from postgres [`Oid`].
//!
//! Integration available for:
//!
//! - [`time`][::time]'s [`Date`][td], [`Time`][tt], [`PrimitiveDateTime`][tp], [`UtcDateTime`][tu],
//!   requires `time` feature
//! - [`serde`]'s [`Deserialize`][sd] and [`Serialize`][ss] via [`Json`], requires `json` feature
//!
//! [td]: ::time::Date
//! [tt]: ::time::Time
//! [tp]: ::time::PrimitiveDateTime
//! [tu]: ::time::UtcDateTime
//! [sd]: serde::Deserialize
//! [ss]: serde::Serialize
use std::fmt;

use crate::postgres::{Oid, oid};

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::Json;

#[cfg(feature = "time")]
pub(crate) mod time;

/// Declared SQL type of a parameter or a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Arbitrary precision number, exposed as its exact decimal text.
    Numeric,
    /// `text`, `varchar`, `bpchar`, `name` and `unknown`.
    Text,
    Bytea,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    /// `json` and `jsonb`.
    Json,
    Uuid,
    Oid,
    /// Type without portable representation, values are exposed as raw bytes.
    Unknown(Oid),
}

impl SqlType {
    /// Map postgres type [`Oid`] into portable type.
    pub const fn from_oid(oid: Oid) -> SqlType {
        match oid {
            oid::BOOL => Self::Bool,
            oid::INT2 => Self::Int16,
            oid::INT4 => Self::Int32,
            oid::INT8 => Self::Int64,
            oid::FLOAT4 => Self::Float32,
            oid::FLOAT8 => Self::Float64,
            oid::NUMERIC => Self::Numeric,
            oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::NAME | oid::UNKNOWN => Self::Text,
            oid::BYTEA => Self::Bytea,
            oid::DATE => Self::Date,
            oid::TIME => Self::Time,
            oid::TIMESTAMP => Self::Timestamp,
            oid::TIMESTAMPTZ => Self::TimestampTz,
            oid::JSON | oid::JSONB => Self::Json,
            oid::UUID => Self::Uuid,
            oid::OID => Self::Oid,
            oid => Self::Unknown(oid),
        }
    }

    /// The canonical postgres [`Oid`] of this type.
    pub const fn oid(&self) -> Oid {
        match self {
            Self::Bool => oid::BOOL,
            Self::Int16 => oid::INT2,
            Self::Int32 => oid::INT4,
            Self::Int64 => oid::INT8,
            Self::Float32 => oid::FLOAT4,
            Self::Float64 => oid::FLOAT8,
            Self::Numeric => oid::NUMERIC,
            Self::Text => oid::TEXT,
            Self::Bytea => oid::BYTEA,
            Self::Date => oid::DATE,
            Self::Time => oid::TIME,
            Self::Timestamp => oid::TIMESTAMP,
            Self::TimestampTz => oid::TIMESTAMPTZ,
            Self::Json => oid::JSONB,
            Self::Uuid => oid::UUID,
            Self::Oid => oid::OID,
            Self::Unknown(oid) => *oid,
        }
    }

    /// Postgres name of this type.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int16 => "int2",
            Self::Int32 => "int4",
            Self::Int64 => "int8",
            Self::Float32 => "float4",
            Self::Float64 => "float8",
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Bytea => "bytea",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Json => "jsonb",
            Self::Uuid => "uuid",
            Self::Oid => "oid",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Binary width of fixed length type, [`None`] for variable length type.
    pub const fn fixed_len(&self) -> Option<i32> {
        match self {
            Self::Bool => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 | Self::Oid | Self::Date => Some(4),
            Self::Int64 | Self::Float64 | Self::Time | Self::Timestamp | Self::TimestampTz => Some(8),
            Self::Uuid => Some(16),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(oid) => write!(f, "unknown({oid})"),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SqlType;
    use crate::postgres::oid;

    #[test]
    fn oid_mapping() {
        assert_eq!(SqlType::from_oid(oid::INT4), SqlType::Int32);
        assert_eq!(SqlType::from_oid(oid::VARCHAR), SqlType::Text);
        assert_eq!(SqlType::from_oid(oid::NAME), SqlType::Text);
        assert_eq!(SqlType::from_oid(oid::JSON), SqlType::Json);
        assert_eq!(SqlType::from_oid(600), SqlType::Unknown(600));
        assert_eq!(SqlType::Unknown(600).oid(), 600);
        assert_eq!(SqlType::Unknown(600).to_string(), "unknown(600)");
        assert_eq!(SqlType::Int64.fixed_len(), Some(8));
        assert_eq!(SqlType::Text.fixed_len(), None);
    }
}
