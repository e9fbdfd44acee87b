//! Typed extraction of output values.
//!
//! - [`Decode`]
//! - [`DecodeError`]
//! - [`TypeMismatch`]
use bytes::{Bytes, TryGetError};
use std::{fmt, string::FromUtf8Error};

use crate::{
    column::OutputParameter,
    postgres::ProtocolError,
    types::SqlType,
    value::Value,
};

/// A type that can be extracted from [`OutputParameter`].
///
/// Extraction follows the declared type of the column, integers and floats
/// can be read as a wider type of the same family.
pub trait Decode: Sized {
    /// Try decode self from output parameter.
    fn decode(param: &OutputParameter) -> Result<Self, DecodeError>;
}

impl Decode for Value {
    fn decode(param: &OutputParameter) -> Result<Self, DecodeError> {
        param.value().cloned().ok_or(DecodeError::Null)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(param: &OutputParameter) -> Result<Self, DecodeError> {
        match param.is_null() {
            true => Ok(None),
            false => T::decode(param).map(Some),
        }
    }
}

macro_rules! decode {
    ($ty:ty, $($pat:pat => $body:expr),* $(,)?) => {
        impl Decode for $ty {
            fn decode(param: &OutputParameter) -> Result<Self, DecodeError> {
                match param.value() {
                    $(Some($pat) => Ok($body),)*
                    Some(_) => Err(TypeMismatch::new::<Self>(param.sql_type()).into()),
                    None => Err(DecodeError::Null),
                }
            }
        }
    };
}

decode!(bool, Value::Bool(v) => *v);
decode!(i16, Value::Int16(v) => *v);
decode!(i32,
    Value::Int16(v) => (*v).into(),
    Value::Int32(v) => *v,
);
decode!(i64,
    Value::Int16(v) => (*v).into(),
    Value::Int32(v) => (*v).into(),
    Value::Int64(v) => *v,
    Value::Oid(v) => (*v).into(),
);
decode!(u32, Value::Oid(v) => *v);
decode!(f32, Value::Float32(v) => *v);
decode!(f64,
    Value::Float32(v) => (*v).into(),
    Value::Float64(v) => *v,
);
decode!(String, Value::Text(v) | Value::Numeric(v) | Value::Json(v) => v.clone());
decode!(Vec<u8>, Value::Bytea(v) | Value::Raw(v) => v.to_vec());
decode!(Bytes, Value::Bytea(v) | Value::Raw(v) => v.clone());
decode!([u8; 16], Value::Uuid(v) => *v);

#[cfg(feature = "time")]
decode!(time::Date, Value::Date(v) => *v);
#[cfg(feature = "time")]
decode!(time::Time, Value::Time(v) => *v);
#[cfg(feature = "time")]
decode!(time::PrimitiveDateTime, Value::Timestamp(v) => *v);
#[cfg(feature = "time")]
decode!(time::UtcDateTime, Value::TimestampTz(v) => *v);

/// Requested rust type is not compatible with the declared column type.
#[derive(Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    declared: SqlType,
    requested: &'static str,
}

impl TypeMismatch {
    pub(crate) fn new<T: ?Sized>(declared: SqlType) -> Self {
        Self { declared, requested: std::any::type_name::<T>() }
    }

    /// Declared type of the column.
    pub fn declared(&self) -> SqlType {
        self.declared
    }

    /// Name of the requested rust type.
    pub fn requested(&self) -> &'static str {
        self.requested
    }
}

impl std::error::Error for TypeMismatch { }

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot decode `{}` column as `{}`", self.declared, self.requested)
    }
}

impl fmt::Debug for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error when decoding value.
pub enum DecodeError {
    /// Requested type does not match the declared type.
    TypeMismatch(TypeMismatch),
    /// Value is NULL.
    Null,
    /// Text value is not valid utf8.
    Utf8(FromUtf8Error),
    /// Binary value does not have the layout of its declared type.
    Malformed(&'static str),
    /// Binary value is out of range of the target type.
    OutOfRange,
    #[cfg(feature = "json")]
    Json(serde_json::Error),
}

impl From<TypeMismatch> for DecodeError {
    fn from(value: TypeMismatch) -> Self {
        Self::TypeMismatch(value)
    }
}

impl From<FromUtf8Error> for DecodeError {
    fn from(value: FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl From<ProtocolError> for DecodeError {
    fn from(value: ProtocolError) -> Self {
        match value {
            ProtocolError::Malformed { reason } => Self::Malformed(reason),
            _ => Self::Malformed("unexpected value layout"),
        }
    }
}

impl From<TryGetError> for DecodeError {
    fn from(value: TryGetError) -> Self {
        ProtocolError::from(value).into()
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl std::error::Error for DecodeError { }

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Failed to decode value, ")?;
        match self {
            Self::TypeMismatch(e) => fmt::Display::fmt(e, f),
            Self::Null => f.write_str("value is NULL"),
            Self::Utf8(e) => fmt::Display::fmt(e, f),
            Self::Malformed(reason) => write!(f, "malformed value: {reason}"),
            Self::OutOfRange => f.write_str("value out of range"),
            #[cfg(feature = "json")]
            Self::Json(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::column::OutputParameter;

    fn param(value: Value) -> OutputParameter {
        OutputParameter::new(value.sql_type(), Some(value))
    }

    #[test]
    fn widening() {
        let p = param(Value::Int32(42));
        assert_eq!(p.get::<i32>().unwrap(), 42);
        assert_eq!(p.get::<i64>().unwrap(), 42);
        assert!(matches!(p.get::<i16>(), Err(DecodeError::TypeMismatch(_))));

        let p = param(Value::Float32(1.5));
        assert_eq!(p.get::<f64>().unwrap(), 1.5);
    }

    #[test]
    fn mismatch() {
        let p = param(Value::Text("42".into()));
        let Err(DecodeError::TypeMismatch(err)) = p.get::<i32>() else {
            panic!("expected type mismatch");
        };
        assert_eq!(err.declared(), SqlType::Text);
        assert_eq!(err.requested(), "i32");
        assert_eq!(err.to_string(), "cannot decode `text` column as `i32`");
    }

    #[test]
    fn null() {
        let p = OutputParameter::new(SqlType::Int32, None);
        assert!(p.is_null());
        assert!(matches!(p.get::<i32>(), Err(DecodeError::Null)));
        assert_eq!(p.get::<Option<i32>>().unwrap(), None);
        assert_eq!(param(Value::Int32(7)).get::<Option<i32>>().unwrap(), Some(7));
    }
}
