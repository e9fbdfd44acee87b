use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::borrow::Cow;

use crate::{
    Decode, DecodeError, Encode, InputParameter,
    column::OutputParameter,
    decode::TypeMismatch,
    types::SqlType,
    value::{Value, ValueRef},
};

/// Decode and Encode postgres `json` and `jsonb` value.
///
/// # Panics
///
/// Note that when performing [`Encode`], if [`Serialize`] implementation decide
/// to fail, it will will panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Decode for Json<T>
where
    T: DeserializeOwned,
{
    fn decode(param: &OutputParameter) -> Result<Self, DecodeError> {
        match param.value() {
            Some(Value::Json(v)) => Ok(Self(serde_json::from_str(v)?)),
            Some(_) => Err(TypeMismatch::new::<Self>(param.sql_type()).into()),
            None => Err(DecodeError::Null),
        }
    }
}

impl<T: Serialize> Encode<'static> for Json<T> {
    const SQL_TYPE: SqlType = SqlType::Json;

    fn encode(self) -> InputParameter<'static> {
        let json = serde_json::to_string(&self.0).expect("failed to serialize json parameter");
        InputParameter::new(ValueRef::Json(Cow::Owned(json)))
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};

    use super::Json;
    use crate::{Encode, column::OutputParameter, decode::DecodeError, types::SqlType, value::Value};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn typed_document() {
        let out = OutputParameter::new(SqlType::Json, Some(Value::Json(r#"{"x":1,"y":2}"#.into())));
        let Json(point) = out.get::<Json<Point>>().unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });

        let out = OutputParameter::new(SqlType::Text, Some(Value::Text("{}".into())));
        assert!(matches!(out.get::<Json<Point>>(), Err(DecodeError::TypeMismatch(_))));
    }

    #[test]
    fn encode_as_text() {
        let param = Json(Point { x: 3, y: 4 }).encode();
        assert_eq!(param.sql_type(), SqlType::Json);
        assert_eq!(param.value().unwrap().text(), r#"{"x":3,"y":4}"#);
        assert!(param.value().unwrap().binary().is_none());
    }
}
