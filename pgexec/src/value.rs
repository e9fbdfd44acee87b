//! Owned output values and borrowed input values.
use bytes::{Buf, Bytes};
use std::{borrow::Cow, fmt::Write};

use crate::{
    decode::DecodeError,
    postgres::{Oid, oid},
    types::SqlType,
};

/// Decoded value of a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Exact decimal text, `NaN` and `Infinity` included.
    Numeric(String),
    Text(String),
    Bytea(Bytes),
    Uuid([u8; 16]),
    Oid(u32),
    /// Json document text.
    Json(String),
    #[cfg(feature = "time")]
    Date(time::Date),
    #[cfg(feature = "time")]
    Time(time::Time),
    #[cfg(feature = "time")]
    Timestamp(time::PrimitiveDateTime),
    #[cfg(feature = "time")]
    TimestampTz(time::UtcDateTime),
    /// Binary value of a type without portable representation.
    Raw(Bytes),
}

fn fixed<const N: usize>(value: &[u8]) -> Result<[u8; N], DecodeError> {
    value.try_into().map_err(|_| DecodeError::Malformed("unexpected value length"))
}

impl Value {
    /// Decode binary formatted value with postgres type `oid`.
    pub fn from_binary(oid: Oid, value: Bytes) -> Result<Value, DecodeError> {
        let value = match SqlType::from_oid(oid) {
            SqlType::Bool => Value::Bool(fixed::<1>(&value)?[0] != 0),
            SqlType::Int16 => Value::Int16(i16::from_be_bytes(fixed(&value)?)),
            SqlType::Int32 => Value::Int32(i32::from_be_bytes(fixed(&value)?)),
            SqlType::Int64 => Value::Int64(i64::from_be_bytes(fixed(&value)?)),
            SqlType::Float32 => Value::Float32(f32::from_be_bytes(fixed(&value)?)),
            SqlType::Float64 => Value::Float64(f64::from_be_bytes(fixed(&value)?)),
            SqlType::Oid => Value::Oid(u32::from_be_bytes(fixed(&value)?)),
            SqlType::Uuid => Value::Uuid(fixed(&value)?),
            SqlType::Numeric => Value::Numeric(decode_numeric(value)?),
            SqlType::Text => Value::Text(String::from_utf8(value.into())?),
            SqlType::Bytea => Value::Bytea(value),
            SqlType::Json => {
                let mut value = value;
                if oid == oid::JSONB {
                    if value.first() != Some(&1) {
                        return Err(DecodeError::Malformed("unsupported jsonb version"));
                    }
                    value.advance(1);
                }
                Value::Json(String::from_utf8(value.into())?)
            }
            #[cfg(feature = "time")]
            SqlType::Date => crate::types::time::decode_date(i32::from_be_bytes(fixed(&value)?)),
            #[cfg(feature = "time")]
            SqlType::Time => crate::types::time::decode_time(i64::from_be_bytes(fixed(&value)?))?,
            #[cfg(feature = "time")]
            SqlType::Timestamp => {
                crate::types::time::decode_timestamp(i64::from_be_bytes(fixed(&value)?))
            }
            #[cfg(feature = "time")]
            SqlType::TimestampTz => {
                crate::types::time::decode_timestamptz(i64::from_be_bytes(fixed(&value)?))
            }
            _ => Value::Raw(value),
        };
        Ok(value)
    }

    /// Portable type of this value.
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Bool(_) => SqlType::Bool,
            Self::Int16(_) => SqlType::Int16,
            Self::Int32(_) => SqlType::Int32,
            Self::Int64(_) => SqlType::Int64,
            Self::Float32(_) => SqlType::Float32,
            Self::Float64(_) => SqlType::Float64,
            Self::Numeric(_) => SqlType::Numeric,
            Self::Text(_) => SqlType::Text,
            Self::Bytea(_) => SqlType::Bytea,
            Self::Uuid(_) => SqlType::Uuid,
            Self::Oid(_) => SqlType::Oid,
            Self::Json(_) => SqlType::Json,
            #[cfg(feature = "time")]
            Self::Date(_) => SqlType::Date,
            #[cfg(feature = "time")]
            Self::Time(_) => SqlType::Time,
            #[cfg(feature = "time")]
            Self::Timestamp(_) => SqlType::Timestamp,
            #[cfg(feature = "time")]
            Self::TimestampTz(_) => SqlType::TimestampTz,
            Self::Raw(_) => SqlType::Unknown(oid::UNSPECIFIED),
        }
    }
}

/// Numeric binary layout: `ndigits`, `weight`, `sign`, `dscale`, then `ndigits`
/// base 10000 digits, most significant first.
fn decode_numeric(mut value: Bytes) -> Result<String, DecodeError> {
    const POSITIVE: u16 = 0x0000;
    const NEGATIVE: u16 = 0x4000;
    const NAN: u16 = 0xC000;
    const PINF: u16 = 0xD000;
    const NINF: u16 = 0xF000;

    let ndigits = value.try_get_i16()?;
    let weight = value.try_get_i16()?;
    let sign = value.try_get_u16()?;
    let dscale = value.try_get_u16()?;

    match sign {
        POSITIVE | NEGATIVE => { },
        NAN => return Ok("NaN".into()),
        PINF => return Ok("Infinity".into()),
        NINF => return Ok("-Infinity".into()),
        _ => return Err(DecodeError::Malformed("invalid numeric sign")),
    }

    let digits = (0..ndigits.max(0))
        .map(|_| value.try_get_i16())
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |i: i32| match usize::try_from(i) {
        Ok(i) => digits.get(i).copied().unwrap_or(0),
        Err(_) => 0,
    };

    let mut out = String::new();
    if sign == NEGATIVE {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(itoa::Buffer::new().format(digit(0)));
        for i in 1..=i32::from(weight) {
            let _ = write!(out, "{:04}", digit(i));
        }
    }

    if dscale > 0 {
        out.push('.');
        let start = out.len();
        let mut i = i32::from(weight) + 1;
        while out.len() - start < usize::from(dscale) {
            let _ = write!(out, "{:04}", digit(i));
            i += 1;
        }
        out.truncate(start + usize::from(dscale));
    }

    Ok(out)
}

/// Input value, variable length payload may be borrowed from the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef<'a> {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Decimal text, always sent in text format.
    Numeric(Cow<'a, str>),
    Text(Cow<'a, str>),
    Bytea(Cow<'a, [u8]>),
    Uuid([u8; 16]),
    Oid(u32),
    /// Json document text, always sent in text format.
    Json(Cow<'a, str>),
    #[cfg(feature = "time")]
    Date(time::Date),
    #[cfg(feature = "time")]
    Time(time::Time),
    #[cfg(feature = "time")]
    Timestamp(time::PrimitiveDateTime),
    #[cfg(feature = "time")]
    TimestampTz(time::UtcDateTime),
}

impl ValueRef<'_> {
    /// Portable type of this value.
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Bool(_) => SqlType::Bool,
            Self::Int16(_) => SqlType::Int16,
            Self::Int32(_) => SqlType::Int32,
            Self::Int64(_) => SqlType::Int64,
            Self::Float32(_) => SqlType::Float32,
            Self::Float64(_) => SqlType::Float64,
            Self::Numeric(_) => SqlType::Numeric,
            Self::Text(_) => SqlType::Text,
            Self::Bytea(_) => SqlType::Bytea,
            Self::Uuid(_) => SqlType::Uuid,
            Self::Oid(_) => SqlType::Oid,
            Self::Json(_) => SqlType::Json,
            #[cfg(feature = "time")]
            Self::Date(_) => SqlType::Date,
            #[cfg(feature = "time")]
            Self::Time(_) => SqlType::Time,
            #[cfg(feature = "time")]
            Self::Timestamp(_) => SqlType::Timestamp,
            #[cfg(feature = "time")]
            Self::TimestampTz(_) => SqlType::TimestampTz,
        }
    }

    /// Binary representation, [`None`] if value only have text representation.
    pub fn binary(&self) -> Option<Cow<'_, [u8]>> {
        fn owned(value: &[u8]) -> Option<Cow<'static, [u8]>> {
            Some(Cow::Owned(value.to_vec()))
        }

        match self {
            Self::Bool(v) => owned(&[u8::from(*v)]),
            Self::Int16(v) => owned(&v.to_be_bytes()),
            Self::Int32(v) => owned(&v.to_be_bytes()),
            Self::Int64(v) => owned(&v.to_be_bytes()),
            Self::Float32(v) => owned(&v.to_be_bytes()),
            Self::Float64(v) => owned(&v.to_be_bytes()),
            Self::Oid(v) => owned(&v.to_be_bytes()),
            Self::Text(v) => Some(Cow::Borrowed(v.as_bytes())),
            Self::Bytea(v) => Some(Cow::Borrowed(&**v)),
            Self::Uuid(v) => Some(Cow::Borrowed(&v[..])),
            Self::Numeric(_) | Self::Json(_) => None,
            #[cfg(feature = "time")]
            Self::Date(v) => owned(&crate::types::time::encode_date(*v).to_be_bytes()),
            #[cfg(feature = "time")]
            Self::Time(v) => owned(&crate::types::time::encode_time(*v).to_be_bytes()),
            #[cfg(feature = "time")]
            Self::Timestamp(v) => owned(&crate::types::time::encode_timestamp(*v).to_be_bytes()),
            #[cfg(feature = "time")]
            Self::TimestampTz(v) => {
                owned(&crate::types::time::encode_timestamptz(*v).to_be_bytes())
            }
        }
    }

    /// Text representation, accepted by the input function of any compatible postgres type.
    pub fn text(&self) -> Cow<'_, str> {
        fn float(v: f64) -> Cow<'static, str> {
            if v.is_nan() {
                "NaN".into()
            } else if v.is_infinite() {
                Cow::Borrowed(if v > 0.0 { "Infinity" } else { "-Infinity" })
            } else {
                v.to_string().into()
            }
        }

        match self {
            Self::Bool(v) => Cow::Borrowed(if *v { "t" } else { "f" }),
            Self::Int16(v) => itoa::Buffer::new().format(*v).to_owned().into(),
            Self::Int32(v) => itoa::Buffer::new().format(*v).to_owned().into(),
            Self::Int64(v) => itoa::Buffer::new().format(*v).to_owned().into(),
            Self::Oid(v) => itoa::Buffer::new().format(*v).to_owned().into(),
            Self::Float32(v) if v.is_finite() => v.to_string().into(),
            Self::Float32(v) => float(f64::from(*v)),
            Self::Float64(v) => float(*v),
            Self::Numeric(v) | Self::Text(v) | Self::Json(v) => Cow::Borrowed(&**v),
            Self::Bytea(v) => format!("\\x{}", hex::encode(v)).into(),
            Self::Uuid(v) => {
                let hex = hex::encode(v);
                format!(
                    "{}-{}-{}-{}-{}",
                    &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..]
                )
                .into()
            }
            #[cfg(feature = "time")]
            Self::Date(v) => crate::types::time::format_date(*v).into(),
            #[cfg(feature = "time")]
            Self::Time(v) => crate::types::time::format_time(*v).into(),
            #[cfg(feature = "time")]
            Self::Timestamp(v) => crate::types::time::format_timestamp(*v).into(),
            #[cfg(feature = "time")]
            Self::TimestampTz(v) => crate::types::time::format_timestamptz(*v).into(),
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};

    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[i16]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_i16(digits.len() as i16);
        buf.put_i16(weight);
        buf.put_u16(sign);
        buf.put_u16(dscale);
        for &d in digits {
            buf.put_i16(d);
        }
        buf.freeze()
    }

    #[test]
    fn numeric_text() {
        let decode = |b| decode_numeric(b).unwrap();
        assert_eq!(decode(numeric(1, 0, 3, &[1, 2345, 6780])), "12345.678");
        assert_eq!(decode(numeric(-1, 0, 4, &[12])), "0.0012");
        assert_eq!(decode(numeric(-2, 0, 5, &[1000])), "0.00001");
        assert_eq!(decode(numeric(2, 0x4000, 0, &[1])), "-100000000");
        assert_eq!(decode(numeric(0, 0, 2, &[])), "0.00");
        assert_eq!(decode(numeric(0, 0xC000, 0, &[])), "NaN");
        assert!(decode_numeric(Bytes::from_static(&[0, 1])).is_err());
    }

    #[test]
    fn binary_values() {
        let v = Value::from_binary(oid::INT4, Bytes::from_static(&[0, 0, 0, 42])).unwrap();
        assert_eq!(v, Value::Int32(42));

        let v = Value::from_binary(oid::JSONB, Bytes::from_static(b"\x01{}")).unwrap();
        assert_eq!(v, Value::Json("{}".into()));

        let v = Value::from_binary(oid::JSON, Bytes::from_static(b"[]")).unwrap();
        assert_eq!(v, Value::Json("[]".into()));

        let v = Value::from_binary(oid::VARCHAR, Bytes::from_static(b"abc")).unwrap();
        assert_eq!(v, Value::Text("abc".into()));

        let v = Value::from_binary(600, Bytes::from_static(b"\x01\x02")).unwrap();
        assert_eq!(v, Value::Raw(Bytes::from_static(b"\x01\x02")));

        assert!(Value::from_binary(oid::INT8, Bytes::from_static(&[0, 1])).is_err());
        assert!(Value::from_binary(oid::TEXT, Bytes::from_static(b"\xff")).is_err());
    }

    #[test]
    fn text_values() {
        assert_eq!(ValueRef::Bool(true).text(), "t");
        assert_eq!(ValueRef::Int64(-42).text(), "-42");
        assert_eq!(ValueRef::Float64(f64::NEG_INFINITY).text(), "-Infinity");
        assert_eq!(ValueRef::Float32(f32::NAN).text(), "NaN");
        assert_eq!(ValueRef::Float64(1.5).text(), "1.5");
        assert_eq!(ValueRef::Bytea(Cow::Borrowed(b"\x01\xab")).text(), "\\x01ab");
        assert_eq!(
            ValueRef::Uuid([0x12; 16]).text(),
            "12121212-1212-1212-1212-121212121212"
        );
        assert!(ValueRef::Numeric("1.5".into()).binary().is_none());
        assert_eq!(ValueRef::Int16(1).binary().unwrap(), &[0, 1][..]);
    }
}
