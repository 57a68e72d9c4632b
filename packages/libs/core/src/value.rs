//! 저장 표현 값 (CQL 바인딩 값)
//!
//! 모델 인스턴스는 `serde_json::Value`로 값을 보관하고,
//! 타입 레지스트리의 `coerce`를 거쳐 이 타입으로 변환된 뒤 스토어에 바인딩됩니다.

use std::fmt;
use std::net::IpAddr;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, NaiveDate, SecondsFormat};
use serde_json::{Map, Value};
use uuid::Uuid;

/// CQL 저장 값
#[derive(Debug, Clone, PartialEq)]
pub enum CqlValue {
    Null,
    Ascii(String),
    Text(String),
    Int(i32),
    BigInt(i64),
    SmallInt(i16),
    TinyInt(i8),
    /// 임의 정밀도 정수 (10진 문자열)
    Varint(String),
    Float(f32),
    Double(f64),
    /// 고정 소수점 (10진 문자열, 정밀도 보존)
    Decimal(String),
    Boolean(bool),
    Uuid(Uuid),
    TimeUuid(Uuid),
    /// epoch 밀리초
    Timestamp(i64),
    Date(NaiveDate),
    Blob(Vec<u8>),
    Inet(IpAddr),
    Counter(i64),
    List(Vec<CqlValue>),
    Set(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
}

impl CqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }

    /// JSON 표현으로 변환 (hydration용)
    ///
    /// - timestamp: RFC 3339 (밀리초, `Z`)
    /// - uuid/timeuuid: 소문자 하이픈 표기
    /// - blob: base64
    /// - map: 키를 문자열화한 JSON 객체
    pub fn to_json(&self) -> Value {
        match self {
            CqlValue::Null => Value::Null,
            CqlValue::Ascii(s) | CqlValue::Text(s) => Value::String(s.clone()),
            CqlValue::Int(i) => Value::from(*i),
            CqlValue::BigInt(i) | CqlValue::Counter(i) => Value::from(*i),
            CqlValue::SmallInt(i) => Value::from(*i),
            CqlValue::TinyInt(i) => Value::from(*i),
            CqlValue::Varint(s) | CqlValue::Decimal(s) => Value::String(s.clone()),
            CqlValue::Float(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CqlValue::Double(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CqlValue::Boolean(b) => Value::Bool(*b),
            CqlValue::Uuid(u) | CqlValue::TimeUuid(u) => Value::String(u.to_string()),
            CqlValue::Timestamp(millis) => DateTime::from_timestamp_millis(*millis)
                .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
                .unwrap_or_else(|| Value::from(*millis)),
            CqlValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            CqlValue::Blob(bytes) => Value::String(general_purpose::STANDARD.encode(bytes)),
            CqlValue::Inet(ip) => Value::String(ip.to_string()),
            CqlValue::List(items) | CqlValue::Set(items) => {
                Value::Array(items.iter().map(CqlValue::to_json).collect())
            }
            CqlValue::Map(entries) => {
                let mut obj = Map::new();
                for (k, v) in entries {
                    let key = match k.to_json() {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    obj.insert(key, v.to_json());
                }
                Value::Object(obj)
            }
        }
    }
}

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_to_json() {
        let value = CqlValue::Timestamp(1_700_000_000_123);
        assert_eq!(value.to_json(), Value::String("2023-11-14T22:13:20.123Z".to_string()));
    }

    #[test]
    fn test_map_to_json_stringifies_keys() {
        let value = CqlValue::Map(vec![(CqlValue::Int(1), CqlValue::Text("one".to_string()))]);
        assert_eq!(value.to_json(), serde_json::json!({ "1": "one" }));
    }

    #[test]
    fn test_display_quotes_text() {
        assert_eq!(CqlValue::Text("it's".to_string()).to_string(), "'it''s'");
        assert_eq!(CqlValue::Int(5).to_string(), "5");
    }
}
