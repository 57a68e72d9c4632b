//! CRUD CQL 빌더
//!
//! 컴파일된 스키마와 쿼리 객체를 받아 CQL을 생성합니다.
//! 값은 모두 `?` 바인딩 파라미터로 전달됩니다.

use serde_json::{Map, Value};

use clb_core::schema::{Schema, SortOrder};
use clb_core::{CqlValue, Error, Instance, Result};

use crate::filter::FilterSet;
use crate::params::{QueryObject, QueryOptions, SaveOptions};
use crate::statement::{qualified_table, quote_ident, Statement};

/// 번역된 조회
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub statement: Statement,

    /// 인스턴스 대신 원시 행을 반환할지
    pub raw: bool,
}

/// SELECT 쿼리 빌더 (Query Translator)
pub struct SelectBuilder<'a> {
    schema: &'a Schema,
    keyspace: Option<&'a str>,
}

impl<'a> SelectBuilder<'a> {
    /// 새 빌더 생성
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            keyspace: None,
        }
    }

    pub fn keyspace(mut self, keyspace: Option<&'a str>) -> Self {
        self.keyspace = keyspace;
        self
    }

    /// CQL 생성
    ///
    /// 스토어가 거부할 제약 배치, 정렬, 제한은 실행 전에 에러로 돌려줍니다.
    pub fn build(&self, query: &QueryObject, options: &QueryOptions) -> Result<CompiledQuery> {
        let filters = FilterSet::compile(self.schema, query)?;
        filters.check_select(options.allow_filtering)?;

        let mut params = Vec::new();
        let mut cql = format!(
            "SELECT {} FROM {}",
            self.build_select_columns(options)?,
            qualified_table(self.keyspace, self.schema.table_name())
        );

        // WHERE
        if let Some(clause) = filters.render(&mut params) {
            cql.push_str(" WHERE ");
            cql.push_str(&clause);
        }

        // ORDER BY
        if let Some(order_by) = self.build_order_by(&filters, &query.order_by)? {
            cql.push_str(" ORDER BY ");
            cql.push_str(&order_by);
        }

        // LIMIT
        if let Some(limit) = query.limit.as_ref() {
            params.push(CqlValue::Int(parse_limit(limit)?));
            cql.push_str(" LIMIT ?");
        }

        if options.allow_filtering {
            cql.push_str(" ALLOW FILTERING");
        }

        tracing::debug!("compiled query for {}: {}", self.schema.model_name(), cql);

        Ok(CompiledQuery {
            statement: Statement::with_params(cql, params),
            raw: options.raw,
        })
    }

    fn build_select_columns(&self, options: &QueryOptions) -> Result<String> {
        let Some(columns) = &options.select else {
            return Ok("*".to_string());
        };
        if columns.is_empty() {
            return Err(Error::query_shape("select must name at least one column"));
        }

        let mut quoted = Vec::with_capacity(columns.len());
        for name in columns {
            let field = self.schema.field(name).ok_or_else(|| Error::UnknownField {
                field: name.clone(),
            })?;
            if field.is_virtual() {
                return Err(Error::query_shape(format!(
                    "virtual field '{}' cannot be selected",
                    name
                )));
            }
            quoted.push(quote_ident(name));
        }
        Ok(quoted.join(", "))
    }

    /// ORDER BY 검증 및 렌더링
    ///
    /// partition key 전체가 equality 또는 `$in`으로 제한되어야 하고, 필드는 clustering key의
    /// 접두사(키 순서)여야 하며, 방향은 선언 순서와 모두 같거나 모두 반대여야 합니다.
    fn build_order_by(
        &self,
        filters: &FilterSet<'_>,
        order_by: &[(String, SortOrder)],
    ) -> Result<Option<String>> {
        if order_by.is_empty() {
            return Ok(None);
        }
        let invalid = |message: String| Error::InvalidOrderBy { message };

        if !filters.restricts_partition() {
            return Err(invalid(format!(
                "ordering requires every partition key column ({}) restricted by equality or $in",
                self.schema.key().partition_key_fields().join(", ")
            )));
        }

        let key = self.schema.key();
        let clustering = key.clustering_key_fields();
        if order_by.len() > clustering.len() {
            return Err(invalid(format!(
                "{} has {} clustering column(s), cannot order by {}",
                self.schema.model_name(),
                clustering.len(),
                order_by.len()
            )));
        }

        let mut same = true;
        let mut reversed = true;
        for ((name, direction), expected) in order_by.iter().zip(clustering) {
            if name != expected {
                return Err(invalid(format!(
                    "ordering must follow the clustering key: expected '{}', got '{}'",
                    expected, name
                )));
            }
            let declared = key.clustering_order(name).unwrap_or_default();
            same &= *direction == declared;
            reversed &= *direction == declared.reverse();
        }
        if !same && !reversed {
            return Err(invalid(
                "directions must all match the declared clustering order or all reverse it"
                    .to_string(),
            ));
        }

        Ok(Some(
            order_by
                .iter()
                .map(|(name, direction)| format!("{} {}", quote_ident(name), direction.as_cql()))
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }
}

fn parse_limit(value: &Value) -> Result<i32> {
    let invalid = || Error::InvalidLimit {
        message: format!("$limit must be a positive 32-bit integer, got {}", value),
    };
    let n = value.as_i64().ok_or_else(invalid)?;
    if n <= 0 {
        return Err(invalid());
    }
    i32::try_from(n).map_err(|_| invalid())
}

/// INSERT 쿼리 빌더 (upsert)
pub struct InsertBuilder<'a> {
    schema: &'a Schema,
    keyspace: Option<&'a str>,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            keyspace: None,
        }
    }

    pub fn keyspace(mut self, keyspace: Option<&'a str>) -> Self {
        self.keyspace = keyspace;
        self
    }

    /// 인스턴스 저장 CQL 생성
    ///
    /// 스토어 기본값을 기다리는 필드는 스토어 함수 호출로 그대로 들어갑니다.
    /// 모든 키 컴포넌트는 설정되었거나 스토어 기본값이어야 합니다.
    pub fn build(&self, instance: &Instance, options: &SaveOptions) -> Result<Statement> {
        for name in self.schema.key().primary_key_fields() {
            if !instance.is_set(name) && !instance.is_deferred(name) {
                return Err(Error::IncompleteKey {
                    field: name.clone(),
                });
            }
        }

        let row = instance.to_row()?;
        let deferred: Vec<(&str, &str)> = instance.deferred_fields().collect();

        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut params = Vec::new();
        for field in self.schema.persisted_fields() {
            if let Some((_, expr)) = deferred.iter().find(|(name, _)| *name == field.name) {
                columns.push(quote_ident(&field.name));
                values.push(expr.to_string());
            } else if let Some((_, value)) = row.iter().find(|(name, _)| *name == field.name) {
                columns.push(quote_ident(&field.name));
                values.push("?".to_string());
                params.push(value.clone());
            }
        }

        let mut cql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualified_table(self.keyspace, self.schema.table_name()),
            columns.join(", "),
            values.join(", ")
        );
        if options.if_not_exists {
            cql.push_str(" IF NOT EXISTS");
        }
        if let Some(ttl) = options.ttl {
            cql.push_str(" USING TTL ?");
            params.push(CqlValue::Int(ttl_param(ttl)?));
        }

        tracing::debug!("compiled insert for {}: {}", self.schema.model_name(), cql);
        Ok(Statement::with_params(cql, params))
    }
}

fn ttl_param(ttl: u32) -> Result<i32> {
    i32::try_from(ttl).map_err(|_| Error::query_shape(format!("ttl out of range: {}", ttl)))
}

/// UPDATE 쿼리 빌더
pub struct UpdateBuilder<'a> {
    schema: &'a Schema,
    keyspace: Option<&'a str>,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            keyspace: None,
        }
    }

    pub fn keyspace(mut self, keyspace: Option<&'a str>) -> Self {
        self.keyspace = keyspace;
        self
    }

    /// CQL 생성
    ///
    /// SET 대상은 키가 아닌 저장 필드이며 필드 규칙으로 검증됩니다.
    /// 쿼리는 모든 primary key 컴포넌트를 equality 또는 `$in`으로 제한해야 합니다.
    pub fn build(
        &self,
        query: &QueryObject,
        data: &Map<String, Value>,
        options: &SaveOptions,
    ) -> Result<Statement> {
        if data.is_empty() {
            return Err(Error::query_shape("update requires at least one value"));
        }
        if !query.order_by.is_empty() || query.limit.is_some() {
            return Err(Error::query_shape("$orderby and $limit are not allowed in an update"));
        }

        let filters = FilterSet::compile(self.schema, query)?;
        filters.check_full_key()?;

        let mut params = Vec::new();
        let mut cql = format!(
            "UPDATE {}",
            qualified_table(self.keyspace, self.schema.table_name())
        );
        if let Some(ttl) = options.ttl {
            cql.push_str(" USING TTL ?");
            params.push(CqlValue::Int(ttl_param(ttl)?));
        }

        // SET 절 (선언 순서)
        for name in data.keys() {
            if self.schema.field(name).is_none() {
                return Err(Error::UnknownField {
                    field: name.clone(),
                });
            }
        }
        let mut assignments = Vec::new();
        for field in self.schema.fields() {
            let Some(value) = data.get(&field.name) else {
                continue;
            };
            if field.is_virtual() {
                return Err(Error::query_shape(format!(
                    "virtual field '{}' cannot be updated",
                    field.name
                )));
            }
            if self.schema.key().is_key(&field.name) {
                return Err(Error::query_shape(format!(
                    "key column '{}' cannot be updated",
                    field.name
                )));
            }
            field.validate(value, false)?;
            assignments.push(format!("{} = ?", quote_ident(&field.name)));
            params.push(field.coerce(value)?);
        }
        cql.push_str(" SET ");
        cql.push_str(&assignments.join(", "));

        // WHERE 절
        if let Some(clause) = filters.render(&mut params) {
            cql.push_str(" WHERE ");
            cql.push_str(&clause);
        }

        tracing::debug!("compiled update for {}: {}", self.schema.model_name(), cql);
        Ok(Statement::with_params(cql, params))
    }
}

/// DELETE 쿼리 빌더
pub struct DeleteBuilder<'a> {
    schema: &'a Schema,
    keyspace: Option<&'a str>,
}

impl<'a> DeleteBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            keyspace: None,
        }
    }

    pub fn keyspace(mut self, keyspace: Option<&'a str>) -> Self {
        self.keyspace = keyspace;
        self
    }

    /// 인스턴스 삭제 CQL 생성 (모든 partition + clustering 값으로 식별)
    pub fn build_for_instance(&self, instance: &Instance) -> Result<Statement> {
        let keys = instance.key_values()?;

        let mut clauses = Vec::with_capacity(keys.len());
        let mut params = Vec::with_capacity(keys.len());
        for (name, value) in keys {
            clauses.push(format!("{} = ?", quote_ident(&name)));
            params.push(value);
        }

        let cql = format!(
            "DELETE FROM {} WHERE {}",
            qualified_table(self.keyspace, self.schema.table_name()),
            clauses.join(" AND ")
        );
        tracing::debug!("compiled delete for {}: {}", self.schema.model_name(), cql);
        Ok(Statement::with_params(cql, params))
    }

    /// 쿼리 객체로 삭제 CQL 생성
    ///
    /// partition key 전체가 제한되어야 하며 일반 컬럼 조건은 허용되지 않습니다.
    pub fn build(&self, query: &QueryObject) -> Result<Statement> {
        if !query.order_by.is_empty() || query.limit.is_some() {
            return Err(Error::query_shape("$orderby and $limit are not allowed in a delete"));
        }

        let filters = FilterSet::compile(self.schema, query)?;
        filters.check_delete()?;

        let mut params = Vec::new();
        let clause = filters
            .render(&mut params)
            .ok_or_else(|| Error::query_shape("delete requires a partition key restriction"))?;

        let cql = format!(
            "DELETE FROM {} WHERE {}",
            qualified_table(self.keyspace, self.schema.table_name()),
            clause
        );
        tracing::debug!("compiled delete for {}: {}", self.schema.model_name(), cql);
        Ok(Statement::with_params(cql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clb_core::schema::{FieldSpec, SchemaDescription, ValidationRule};
    use serde_json::json;
    use std::sync::Arc;

    const ID: &str = "6c84fb90-12c4-11e1-840d-7b25c5ee775a";

    fn event_schema() -> Arc<Schema> {
        Arc::new(
            Schema::compile(
                SchemaDescription::new("event")
                    .field("id", FieldSpec::typed("uuid"))
                    .field("ts", FieldSpec::typed("timestamp"))
                    .field("seq", FieldSpec::typed("int"))
                    .field("kind", FieldSpec::typed("text"))
                    .field(
                        "score",
                        FieldSpec::typed("int")
                            .rule(ValidationRule::new(|v| v.as_i64().is_some_and(|n| n >= 0))),
                    )
                    .field("created", FieldSpec::typed("timestamp").default_db("toTimestamp(now())"))
                    .field("label", FieldSpec::virtual_field().getter(|_| Value::Null))
                    .partition_key(["id"])
                    .clustering_key(["ts", "seq"])
                    .clustering_order("ts", SortOrder::Desc)
                    .index("kind"),
            )
            .unwrap(),
        )
    }

    fn select(query: Value, options: QueryOptions) -> Result<CompiledQuery> {
        let schema = event_schema();
        SelectBuilder::new(&schema)
            .keyspace(Some("app"))
            .build(&QueryObject::parse(&query)?, &options)
    }

    #[test]
    fn test_select_builder_basic() {
        let compiled = select(json!({ "id": ID }), QueryOptions::default()).unwrap();
        assert_eq!(
            compiled.statement.cql,
            "SELECT * FROM \"app\".\"event\" WHERE \"id\" = ?"
        );
        assert_eq!(compiled.statement.params.len(), 1);
        assert!(!compiled.raw);
    }

    #[test]
    fn test_select_full_shape() {
        let compiled = select(
            json!({
                "id": ID,
                "ts": { "$gte": "2024-01-01T00:00:00Z" },
                "$orderby": { "$asc": "ts" },
                "$limit": 10
            }),
            QueryOptions {
                raw: true,
                select: Some(vec!["id".to_string(), "ts".to_string()]),
                allow_filtering: false,
            },
        )
        .unwrap();

        assert_eq!(
            compiled.statement.cql,
            "SELECT \"id\", \"ts\" FROM \"app\".\"event\" WHERE \"id\" = ? AND \"ts\" >= ? \
             ORDER BY \"ts\" ASC LIMIT ?"
        );
        assert_eq!(compiled.statement.params.last(), Some(&CqlValue::Int(10)));
        assert!(compiled.raw);
    }

    #[test]
    fn test_seq_range_without_ts_rejected() {
        let err = select(json!({ "seq": { "$gt": 5 } }), QueryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));
    }

    #[test]
    fn test_order_by_rules() {
        // 선언 순서 (ts desc, seq asc) 그대로
        assert!(select(
            json!({ "id": ID, "$orderby": { "$desc": "ts", "$asc": "seq" } }),
            QueryOptions::default()
        )
        .is_ok());

        // 전체 반전
        assert!(select(
            json!({ "id": ID, "$orderby": { "$asc": "ts", "$desc": "seq" } }),
            QueryOptions::default()
        )
        .is_ok());

        // 섞인 방향
        let err = select(
            json!({ "id": ID, "$orderby": { "$desc": ["ts", "seq"] } }),
            QueryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));

        // 접두사가 아님
        let err = select(
            json!({ "id": ID, "$orderby": { "$asc": "seq" } }),
            QueryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));

        // 일반 컬럼
        let err = select(
            json!({ "id": ID, "$orderby": { "$asc": "kind" } }),
            QueryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));
    }

    #[test]
    fn test_order_by_requires_partition() {
        let err = select(json!({ "$orderby": { "$asc": "ts" } }), QueryOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));

        let err = select(
            json!({ "kind": "click", "$orderby": { "$desc": "ts" } }),
            QueryOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOrderBy { .. }));

        let compiled = select(
            json!({ "id": { "$in": [ID] }, "$orderby": { "$desc": "ts" } }),
            QueryOptions::default(),
        )
        .unwrap();
        assert!(compiled.statement.cql.ends_with("ORDER BY \"ts\" DESC"));
    }

    #[test]
    fn test_limit_rules() {
        for bad in [json!(0), json!(-3), json!(2.5), json!("10"), json!(i64::from(i32::MAX) + 1)] {
            let err = select(json!({ "id": ID, "$limit": bad }), QueryOptions::default()).unwrap_err();
            assert!(matches!(err, Error::InvalidLimit { .. }));
        }
    }

    #[test]
    fn test_allow_filtering_appended() {
        let compiled = select(
            json!({ "seq": 3 }),
            QueryOptions {
                allow_filtering: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(compiled.statement.cql.ends_with(" ALLOW FILTERING"));
    }

    #[test]
    fn test_select_projection_rules() {
        let err = select(
            json!({}),
            QueryOptions {
                select: Some(vec!["label".to_string()]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));
    }

    #[test]
    fn test_virtual_field_filter_rejected() {
        let err = select(json!({ "label": "x" }), QueryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));
    }

    #[test]
    fn test_insert_builder_with_deferred_default() {
        let schema = event_schema();
        let instance = Instance::construct(
            Arc::clone(&schema),
            json!({ "id": ID, "ts": 1000, "seq": 1, "kind": "click" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();

        let stmt = InsertBuilder::new(&schema)
            .keyspace(Some("app"))
            .build(
                &instance,
                &SaveOptions {
                    if_not_exists: true,
                    ttl: Some(60),
                },
            )
            .unwrap();

        assert_eq!(
            stmt.cql,
            "INSERT INTO \"app\".\"event\" (\"id\", \"ts\", \"seq\", \"kind\", \"created\") \
             VALUES (?, ?, ?, ?, toTimestamp(now())) IF NOT EXISTS USING TTL ?"
        );
        assert_eq!(stmt.params.len(), 5);
        assert_eq!(stmt.params[1], CqlValue::Timestamp(1000));
        assert_eq!(stmt.params[4], CqlValue::Int(60));
    }

    #[test]
    fn test_insert_incomplete_key() {
        let schema = event_schema();
        let instance = Instance::construct(
            Arc::clone(&schema),
            json!({ "id": ID, "ts": 1000 }).as_object().cloned().unwrap(),
        )
        .unwrap();

        let err = InsertBuilder::new(&schema)
            .build(&instance, &SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::IncompleteKey { ref field } if field == "seq"));
    }

    #[test]
    fn test_update_builder() {
        let schema = event_schema();
        let query = QueryObject::parse(&json!({ "id": ID, "ts": 1000, "seq": 1 })).unwrap();

        let stmt = UpdateBuilder::new(&schema)
            .build(
                &query,
                json!({ "kind": "view", "score": 3 }).as_object().unwrap(),
                &SaveOptions::default(),
            )
            .unwrap();
        assert_eq!(
            stmt.cql,
            "UPDATE \"event\" SET \"kind\" = ?, \"score\" = ? \
             WHERE \"id\" = ? AND \"ts\" = ? AND \"seq\" = ?"
        );
        assert_eq!(stmt.params.len(), 5);

        // 규칙 위반
        let err = UpdateBuilder::new(&schema)
            .build(&query, json!({ "score": -1 }).as_object().unwrap(), &SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));

        // 키 컬럼 갱신 불가
        let err = UpdateBuilder::new(&schema)
            .build(&query, json!({ "seq": 2 }).as_object().unwrap(), &SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));

        // 부분 키
        let partial = QueryObject::parse(&json!({ "id": ID })).unwrap();
        let err = UpdateBuilder::new(&schema)
            .build(&partial, json!({ "kind": "x" }).as_object().unwrap(), &SaveOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));
    }

    #[test]
    fn test_delete_builders() {
        let schema = event_schema();
        let instance = Instance::hydrate(
            Arc::clone(&schema),
            json!({ "id": ID, "ts": "2024-01-01T00:00:00.000Z", "seq": 7 })
                .as_object()
                .cloned()
                .unwrap(),
        );

        let stmt = DeleteBuilder::new(&schema).build_for_instance(&instance).unwrap();
        assert_eq!(
            stmt.cql,
            "DELETE FROM \"event\" WHERE \"id\" = ? AND \"ts\" = ? AND \"seq\" = ?"
        );
        assert_eq!(stmt.params[2], CqlValue::Int(7));

        let stmt = DeleteBuilder::new(&schema)
            .build(&QueryObject::parse(&json!({ "id": ID })).unwrap())
            .unwrap();
        assert_eq!(stmt.cql, "DELETE FROM \"event\" WHERE \"id\" = ?");

        let err = DeleteBuilder::new(&schema)
            .build(&QueryObject::empty())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQueryShape { .. }));
    }
}
