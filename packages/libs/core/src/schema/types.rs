//! 타입 레지스트리
//!
//! 지원되는 CQL 컬럼 타입과 값 변환/검증 규칙을 정의합니다.
//! Field Engine(값 대입)과 Schema Compiler(DDL 타입 이름)가 모두 이 모듈을 사용합니다.

use std::fmt;
use std::net::IpAddr;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::value::CqlValue;

/// CQL 컬럼 타입
///
/// # JSON 표현
///
/// - `bigint`, `varint`, `decimal`은 정밀도 보장을 위해 문자열도 허용합니다.
/// - `timestamp`는 RFC 3339 문자열 또는 epoch 밀리초입니다.
/// - `blob`은 base64 문자열입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Ascii,
    /// `text` / `varchar`
    Text,
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    Varint,
    Float,
    Double,
    Decimal,
    Boolean,
    Uuid,
    TimeUuid,
    Timestamp,
    Date,
    Blob,
    Inet,
    Counter,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Frozen(Box<ColumnType>),
}

/// 타입 레지스트리
///
/// 타입 이름을 `ColumnType`으로 해석합니다.
pub struct TypeRegistry;

impl TypeRegistry {
    /// 타입 이름 해석
    ///
    /// 인식하지 못한 이름이면 `UnknownType`을 반환합니다.
    pub fn resolve(type_name: &str) -> Result<ColumnType> {
        ColumnType::parse(type_name).ok_or_else(|| Error::UnknownType {
            type_name: type_name.to_string(),
        })
    }

    /// DDL 비교용 타입 이름 정규화 (`varchar` → `text`, 공백/대소문자 통일)
    pub fn normalize(type_name: &str) -> String {
        match ColumnType::parse(type_name) {
            Some(t) => t.cql_name(),
            None => type_name
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase(),
        }
    }
}

impl ColumnType {
    /// 타입 문자열 파싱 (`map<text, frozen<list<int>>>` 같은 중첩 포함)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let Some(open) = s.find('<') else {
            return Self::from_simple_str(&s.to_ascii_lowercase());
        };
        if !s.ends_with('>') {
            return None;
        }

        let base = s[..open].trim().to_ascii_lowercase();
        let args = split_type_args(&s[open + 1..s.len() - 1])?;

        match (base.as_str(), args.as_slice()) {
            ("list", [item]) => Some(ColumnType::List(Box::new(Self::parse(item)?))),
            ("set", [item]) => Some(ColumnType::Set(Box::new(Self::parse(item)?))),
            ("map", [key, value]) => Some(ColumnType::Map(
                Box::new(Self::parse(key)?),
                Box::new(Self::parse(value)?),
            )),
            ("frozen", [inner]) => Some(ColumnType::Frozen(Box::new(Self::parse(inner)?))),
            _ => None,
        }
    }

    /// 단순 타입 이름 파싱
    pub fn from_simple_str(s: &str) -> Option<Self> {
        match s {
            "ascii" => Some(ColumnType::Ascii),
            "text" | "varchar" => Some(ColumnType::Text),
            "int" => Some(ColumnType::Int),
            "bigint" => Some(ColumnType::BigInt),
            "smallint" => Some(ColumnType::SmallInt),
            "tinyint" => Some(ColumnType::TinyInt),
            "varint" => Some(ColumnType::Varint),
            "float" => Some(ColumnType::Float),
            "double" => Some(ColumnType::Double),
            "decimal" => Some(ColumnType::Decimal),
            "boolean" => Some(ColumnType::Boolean),
            "uuid" => Some(ColumnType::Uuid),
            "timeuuid" => Some(ColumnType::TimeUuid),
            "timestamp" => Some(ColumnType::Timestamp),
            "date" => Some(ColumnType::Date),
            "blob" => Some(ColumnType::Blob),
            "inet" => Some(ColumnType::Inet),
            "counter" => Some(ColumnType::Counter),
            _ => None,
        }
    }

    /// CQL DDL 타입 이름
    pub fn cql_name(&self) -> String {
        match self {
            ColumnType::Ascii => "ascii".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Int => "int".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::TinyInt => "tinyint".to_string(),
            ColumnType::Varint => "varint".to_string(),
            ColumnType::Float => "float".to_string(),
            ColumnType::Double => "double".to_string(),
            ColumnType::Decimal => "decimal".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::TimeUuid => "timeuuid".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Blob => "blob".to_string(),
            ColumnType::Inet => "inet".to_string(),
            ColumnType::Counter => "counter".to_string(),
            ColumnType::List(item) => format!("list<{}>", item.cql_name()),
            ColumnType::Set(item) => format!("set<{}>", item.cql_name()),
            ColumnType::Map(k, v) => format!("map<{}, {}>", k.cql_name(), v.cql_name()),
            ColumnType::Frozen(inner) => format!("frozen<{}>", inner.cql_name()),
        }
    }

    /// frozen이 아닌 컬렉션 타입 여부 (primary key 불가)
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            ColumnType::List(_) | ColumnType::Set(_) | ColumnType::Map(_, _)
        )
    }

    /// 값 검증
    pub fn validate(&self, value: &Value) -> bool {
        self.coerce(value).is_ok()
    }

    /// JSON 값을 저장 표현으로 변환
    ///
    /// 실패 시 사람이 읽을 수 있는 사유를 반환합니다. 최상위 `null`은 모든 타입에서 허용되지만
    /// 컬렉션 원소로는 허용되지 않습니다.
    pub fn coerce(&self, value: &Value) -> std::result::Result<CqlValue, String> {
        if value.is_null() {
            return Ok(CqlValue::Null);
        }

        match self {
            ColumnType::Ascii => {
                let s = expect_str(value, "ascii")?;
                if !s.is_ascii() {
                    return Err("expected ascii text".to_string());
                }
                Ok(CqlValue::Ascii(s.to_string()))
            }
            ColumnType::Text => Ok(CqlValue::Text(expect_str(value, "text")?.to_string())),
            ColumnType::Int => int_in_range(value, i32::MIN as i64, i32::MAX as i64, "int")
                .map(|i| CqlValue::Int(i as i32)),
            ColumnType::SmallInt => {
                int_in_range(value, i16::MIN as i64, i16::MAX as i64, "smallint")
                    .map(|i| CqlValue::SmallInt(i as i16))
            }
            ColumnType::TinyInt => int_in_range(value, i8::MIN as i64, i8::MAX as i64, "tinyint")
                .map(|i| CqlValue::TinyInt(i as i8)),
            ColumnType::BigInt => parse_i64(value, "bigint").map(CqlValue::BigInt),
            ColumnType::Counter => parse_i64(value, "counter").map(CqlValue::Counter),
            ColumnType::Varint => {
                let text = numeric_text(value, "varint")?;
                let digits = text.strip_prefix('-').unwrap_or(&text);
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(format!("expected varint, got {}", value));
                }
                Ok(CqlValue::Varint(text))
            }
            ColumnType::Float => {
                let f = value
                    .as_f64()
                    .ok_or_else(|| format!("expected float, got {}", value))?;
                if !f.is_finite() || f.abs() > f64::from(f32::MAX) {
                    return Err(format!("float out of range: {}", value));
                }
                Ok(CqlValue::Float(f as f32))
            }
            ColumnType::Double => value
                .as_f64()
                .map(CqlValue::Double)
                .ok_or_else(|| format!("expected double, got {}", value)),
            ColumnType::Decimal => {
                let text = numeric_text(value, "decimal")?;
                if !is_decimal_literal(&text) {
                    return Err(format!("expected decimal, got {}", value));
                }
                Ok(CqlValue::Decimal(text))
            }
            ColumnType::Boolean => value
                .as_bool()
                .map(CqlValue::Boolean)
                .ok_or_else(|| format!("expected boolean, got {}", value)),
            ColumnType::Uuid => parse_uuid(value, "uuid").map(CqlValue::Uuid),
            ColumnType::TimeUuid => {
                let uuid = parse_uuid(value, "timeuuid")?;
                if uuid.get_version_num() != 1 {
                    return Err(format!("expected time-based (v1) uuid, got {}", value));
                }
                Ok(CqlValue::TimeUuid(uuid))
            }
            ColumnType::Timestamp => match value {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .map(|dt| CqlValue::Timestamp(dt.timestamp_millis()))
                    .map_err(|_| format!("expected RFC 3339 timestamp, got {}", value)),
                Value::Number(n) => n
                    .as_i64()
                    .map(CqlValue::Timestamp)
                    .ok_or_else(|| format!("expected epoch milliseconds, got {}", value)),
                _ => Err(format!("expected timestamp, got {}", value)),
            },
            ColumnType::Date => {
                let s = expect_str(value, "date")?;
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(CqlValue::Date)
                    .map_err(|_| format!("expected date (YYYY-MM-DD), got {}", value))
            }
            ColumnType::Blob => {
                let s = expect_str(value, "blob")?;
                general_purpose::STANDARD
                    .decode(s)
                    .map(CqlValue::Blob)
                    .map_err(|_| "expected base64 encoded blob".to_string())
            }
            ColumnType::Inet => {
                let s = expect_str(value, "inet")?;
                s.parse::<IpAddr>()
                    .map(CqlValue::Inet)
                    .map_err(|_| format!("expected ip address, got {}", value))
            }
            ColumnType::List(item) => {
                let items = coerce_items(item, value, "list")?;
                Ok(CqlValue::List(items))
            }
            ColumnType::Set(item) => {
                let mut unique: Vec<CqlValue> = Vec::new();
                for v in coerce_items(item, value, "set")? {
                    if !unique.contains(&v) {
                        unique.push(v);
                    }
                }
                Ok(CqlValue::Set(unique))
            }
            ColumnType::Map(key_type, value_type) => {
                let Value::Object(obj) = value else {
                    return Err(format!("expected map (object), got {}", value));
                };
                let mut entries = Vec::with_capacity(obj.len());
                for (k, v) in obj {
                    let key = key_type.coerce(&map_key_to_json(key_type, k))?;
                    entries.push((key, coerce_element(value_type, v, "map")?));
                }
                Ok(CqlValue::Map(entries))
            }
            ColumnType::Frozen(inner) => inner.coerce(value),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cql_name())
    }
}

/// `<...>` 내부를 최상위 쉼표 기준으로 분리
fn split_type_args(s: &str) -> Option<Vec<&str>> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                args.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(s[start..].trim());

    if args.iter().any(|a| a.is_empty()) {
        return None;
    }
    Some(args)
}

fn expect_str<'a>(value: &'a Value, type_name: &str) -> std::result::Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected {}, got {}", type_name, value))
}

fn int_in_range(
    value: &Value,
    min: i64,
    max: i64,
    type_name: &str,
) -> std::result::Result<i64, String> {
    let i = value
        .as_i64()
        .ok_or_else(|| format!("expected {}, got {}", type_name, value))?;
    if i < min || i > max {
        return Err(format!("{} out of range: {}", type_name, i));
    }
    Ok(i)
}

fn parse_i64(value: &Value, type_name: &str) -> std::result::Result<i64, String> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("expected {}, got {}", type_name, value))
}

fn numeric_text(value: &Value, type_name: &str) -> std::result::Result<String, String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(format!("expected {}, got {}", type_name, value)),
    }
}

fn is_decimal_literal(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };
    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");
    let digits_ok = |p: &str| p.chars().all(|c| c.is_ascii_digit());

    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    if !digits_ok(int_part) || !digits_ok(frac_part) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && digits_ok(exp)
        }
    }
}

fn parse_uuid(value: &Value, type_name: &str) -> std::result::Result<Uuid, String> {
    let s = expect_str(value, type_name)?;
    Uuid::parse_str(s).map_err(|_| format!("expected {}, got {}", type_name, value))
}

fn coerce_items(
    item: &ColumnType,
    value: &Value,
    kind: &str,
) -> std::result::Result<Vec<CqlValue>, String> {
    let Value::Array(arr) = value else {
        return Err(format!("expected {} (array), got {}", kind, value));
    };
    arr.iter().map(|v| coerce_element(item, v, kind)).collect()
}

/// 컬렉션 원소 변환 (`null` 원소는 스토어가 거부)
fn coerce_element(
    item: &ColumnType,
    value: &Value,
    kind: &str,
) -> std::result::Result<CqlValue, String> {
    if value.is_null() {
        return Err(format!("{} elements cannot be null", kind));
    }
    item.coerce(value)
}

/// JSON 객체 키(항상 문자열)를 map 키 타입에 맞게 복원
fn map_key_to_json(key_type: &ColumnType, key: &str) -> Value {
    match key_type {
        ColumnType::Ascii
        | ColumnType::Text
        | ColumnType::Uuid
        | ColumnType::TimeUuid
        | ColumnType::Timestamp
        | ColumnType::Date
        | ColumnType::Blob
        | ColumnType::Inet => Value::String(key.to_string()),
        _ => serde_json::from_str(key).unwrap_or_else(|_| Value::String(key.to_string())),
    }
}
