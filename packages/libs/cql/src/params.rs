//! 쿼리 파라미터
//!
//! JSON 형태의 쿼리 객체(filter / `$orderby` / `$limit`)와 실행 옵션을 파싱합니다.
//!
//! ```json
//! {
//!   "id": "6c84fb90-12c4-11e1-840d-7b25c5ee775a",
//!   "ts": { "$gte": "2024-01-01T00:00:00Z", "$lt": "2024-02-01T00:00:00Z" },
//!   "$orderby": { "$desc": "ts" },
//!   "$limit": 10
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use clb_core::schema::SortOrder;
use clb_core::{Error, Result};

/// WHERE 조건 연산자
///
/// 선언 순서가 곧 WHERE 절 안에서의 출력 순서입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhereOperator {
    /// 같음 (리터럴 값의 기본)
    Eq,
    /// 포함 (IN)
    In,
    /// 보다 큼
    Gt,
    /// 보다 크거나 같음
    Gte,
    /// 보다 작음
    Lt,
    /// 보다 작거나 같음
    Lte,
}

impl WhereOperator {
    /// 문자열에서 파싱 ($gt, $in 등)
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "$eq" => Some(WhereOperator::Eq),
            "$in" => Some(WhereOperator::In),
            "$gt" => Some(WhereOperator::Gt),
            "$gte" => Some(WhereOperator::Gte),
            "$lt" => Some(WhereOperator::Lt),
            "$lte" => Some(WhereOperator::Lte),
            _ => None,
        }
    }

    pub fn as_cql(&self) -> &'static str {
        match self {
            WhereOperator::Eq => "=",
            WhereOperator::In => "IN",
            WhereOperator::Gt => ">",
            WhereOperator::Gte => ">=",
            WhereOperator::Lt => "<",
            WhereOperator::Lte => "<=",
        }
    }

    /// 범위 연산자 여부
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            WhereOperator::Gt | WhereOperator::Gte | WhereOperator::Lt | WhereOperator::Lte
        )
    }

    /// 하한 연산자 여부
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, WhereOperator::Gt | WhereOperator::Gte)
    }
}

/// 단일 조건
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub op: WhereOperator,
    pub value: Value,
}

/// 필드 하나에 걸린 조건들
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub conditions: Vec<Condition>,
}

/// 쿼리 객체
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryObject {
    /// 필드별 조건 (입력 순서 유지, 출력 순서는 번역기가 정함)
    pub filters: Vec<FieldFilter>,

    /// 정렬 (필드, 방향)
    pub order_by: Vec<(String, SortOrder)>,

    /// 제한 (검증 전 원본 값)
    pub limit: Option<Value>,
}

impl QueryObject {
    /// 빈 쿼리 (전체 조회)
    pub fn empty() -> Self {
        Self::default()
    }

    /// JSON 쿼리 객체 파싱
    ///
    /// 필드 값이 `$`로 시작하는 키만 가진 객체면 연산자 객체, 그 외는 equality 리터럴입니다.
    pub fn parse(query: &Value) -> Result<Self> {
        let Value::Object(obj) = query else {
            return Err(Error::query_shape(format!(
                "query must be an object, got {}",
                query
            )));
        };

        let mut parsed = Self::empty();
        for (key, value) in obj {
            match key.as_str() {
                "$orderby" => parsed.order_by = parse_order_by(value)?,
                "$limit" => parsed.limit = Some(value.clone()),
                k if k.starts_with('$') => {
                    return Err(Error::query_shape(format!("unsupported query key '{}'", k)));
                }
                field => {
                    let conditions = parse_conditions(field, value)?;
                    parsed.filters.push(FieldFilter {
                        field: field.to_string(),
                        conditions,
                    });
                }
            }
        }

        Ok(parsed)
    }

    /// equality 조건 추가
    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.filter(field, WhereOperator::Eq, value)
    }

    /// 조건 추가 (같은 필드의 조건은 하나의 FieldFilter로 묶임)
    pub fn filter(mut self, field: impl Into<String>, op: WhereOperator, value: Value) -> Self {
        let field = field.into();
        let condition = Condition { op, value };
        match self.filters.iter_mut().find(|f| f.field == field) {
            Some(existing) => existing.conditions.push(condition),
            None => self.filters.push(FieldFilter {
                field,
                conditions: vec![condition],
            }),
        }
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(Value::from(limit));
        self
    }

    /// 조건이 하나도 없는지
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn parse_conditions(field: &str, value: &Value) -> Result<Vec<Condition>> {
    let operators = match value {
        Value::Object(obj) if !obj.is_empty() && obj.keys().any(|k| k.starts_with('$')) => obj,
        _ => {
            return Ok(vec![Condition {
                op: WhereOperator::Eq,
                value: value.clone(),
            }])
        }
    };

    let mut conditions = Vec::with_capacity(operators.len());
    for (key, operand) in operators {
        let op = WhereOperator::from_str(key).ok_or_else(|| {
            Error::query_shape(format!("unsupported operator '{}' on field '{}'", key, field))
        })?;
        conditions.push(Condition {
            op,
            value: operand.clone(),
        });
    }
    Ok(conditions)
}

fn parse_order_by(value: &Value) -> Result<Vec<(String, SortOrder)>> {
    let invalid = |message: String| Error::InvalidOrderBy { message };

    let Value::Object(obj) = value else {
        return Err(invalid(format!(
            "$orderby must be an object like {{\"$asc\": \"field\"}}, got {}",
            value
        )));
    };

    let mut order_by = Vec::new();
    for (key, fields) in obj {
        let direction = match key.as_str() {
            "$asc" => SortOrder::Asc,
            "$desc" => SortOrder::Desc,
            other => return Err(invalid(format!("unknown direction '{}'", other))),
        };
        match fields {
            Value::String(name) => order_by.push((name.clone(), direction)),
            Value::Array(names) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid(format!("field name expected, got {}", name)))?;
                    order_by.push((name.to_string(), direction));
                }
            }
            other => return Err(invalid(format!("field name expected, got {}", other))),
        }
    }
    Ok(order_by)
}

/// 조회 옵션
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// 인스턴스 대신 원시 행을 반환
    #[serde(default)]
    pub raw: bool,

    /// SELECT할 컬럼 목록 (기본: 전체)
    #[serde(default)]
    pub select: Option<Vec<String>>,

    /// 비인덱스 컬럼 equality 등에 ALLOW FILTERING 허용
    #[serde(default)]
    pub allow_filtering: bool,
}

/// 저장 옵션
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveOptions {
    /// `IF NOT EXISTS` (lightweight transaction)
    #[serde(default)]
    pub if_not_exists: bool,

    /// `USING TTL` (초)
    #[serde(default)]
    pub ttl: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_operator_parsing() {
        assert_eq!(WhereOperator::from_str("$gt"), Some(WhereOperator::Gt));
        assert_eq!(WhereOperator::from_str("$in"), Some(WhereOperator::In));
        assert_eq!(WhereOperator::from_str("$like"), None);
    }

    #[test]
    fn test_parse_query_object() {
        let query = QueryObject::parse(&json!({
            "id": "abc",
            "ts": { "$gte": 1, "$lt": 5 },
            "$orderby": { "$desc": ["ts", "seq"] },
            "$limit": 10
        }))
        .unwrap();

        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].conditions[0].op, WhereOperator::Eq);
        assert_eq!(query.filters[1].conditions.len(), 2);
        assert_eq!(
            query.order_by,
            vec![
                ("ts".to_string(), SortOrder::Desc),
                ("seq".to_string(), SortOrder::Desc)
            ]
        );
        assert_eq!(query.limit, Some(json!(10)));
    }

    #[test]
    fn test_map_literal_is_equality() {
        let query = QueryObject::parse(&json!({ "attrs": { "k": "v" } })).unwrap();
        assert_eq!(query.filters[0].conditions[0].op, WhereOperator::Eq);
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = QueryObject::parse(&json!({ "name": { "$like": "a%" } })).unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));

        let err = QueryObject::parse(&json!({ "$or": [] })).unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));
    }

    #[test]
    fn test_bad_orderby_rejected() {
        let err = QueryObject::parse(&json!({ "$orderby": "ts" })).unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));

        let err = QueryObject::parse(&json!({ "$orderby": { "$up": "ts" } })).unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));
    }

    #[test]
    fn test_builder_groups_conditions() {
        let query = QueryObject::empty()
            .filter("ts", WhereOperator::Gt, json!(1))
            .filter("ts", WhereOperator::Lt, json!(9))
            .limit(5);
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.filters[0].conditions.len(), 2);
    }

    #[test]
    fn test_options_deserialization() {
        let opts: QueryOptions =
            serde_json::from_str(r#"{ "raw": true, "select": ["id"] }"#).unwrap();
        assert!(opts.raw);
        assert!(!opts.allow_filtering);

        let save: SaveOptions = serde_json::from_str(r#"{ "ttl": 60 }"#).unwrap();
        assert_eq!(save.ttl, Some(60));
        assert!(!save.if_not_exists);
    }
}
