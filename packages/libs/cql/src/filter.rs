//! WHERE 제약 검증
//!
//! 쿼리 객체의 필드 조건을 스키마에 대조하여 타입 변환하고,
//! 스토어가 강제하는 partition / clustering 배치 규칙을 실행 전에 검사합니다.
//!
//! - 범위(`$gt` 등)와 `$in`은 마지막 partition key 컴포넌트, 또는 앞선 clustering
//!   컴포넌트가 모두 equality로 제한된 clustering 컴포넌트에만 허용됩니다.
//! - 일반 컬럼의 equality는 secondary index가 있거나 ALLOW FILTERING일 때만 허용됩니다.
//! - 일반 컬럼의 범위 / `$in`은 항상 거부됩니다.
//! - partition key 일부만 제한하거나, partition key 전체 없이 clustering 컬럼을 제한하면
//!   ALLOW FILTERING이 필요합니다.

use clb_core::schema::{FieldDefinition, KeyRole, Schema};
use clb_core::{CqlValue, Error, Result};

use crate::params::{QueryObject, WhereOperator};
use crate::statement::quote_ident;

/// 바인딩할 조건 값
#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Single(CqlValue),
    List(Vec<CqlValue>),
}

/// 변환이 끝난 단일 조건
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub op: WhereOperator,
    pub value: TermValue,
}

/// 필드 하나에 대한 검증된 제약
#[derive(Debug, Clone)]
pub struct Restriction<'a> {
    pub field: &'a FieldDefinition,
    pub role: Option<KeyRole>,
    pub terms: Vec<Term>,
}

impl Restriction<'_> {
    pub fn is_eq(&self) -> bool {
        self.terms.iter().all(|t| t.op == WhereOperator::Eq)
    }

    /// 범위 또는 `$in` 제약 여부
    pub fn is_ranged(&self) -> bool {
        self.terms.iter().any(|t| t.op != WhereOperator::Eq)
    }

    pub fn has_range(&self) -> bool {
        self.terms.iter().any(|t| t.op.is_range())
    }
}

/// 검증된 제약 집합 (key 순서 → 선언 순서로 정렬)
#[derive(Debug, Clone)]
pub struct FilterSet<'a> {
    schema: &'a Schema,
    restrictions: Vec<Restriction<'a>>,
}

impl<'a> FilterSet<'a> {
    /// 쿼리 객체의 조건을 스키마에 대조하여 컴파일
    pub fn compile(schema: &'a Schema, query: &QueryObject) -> Result<Self> {
        let mut restrictions = Vec::with_capacity(query.filters.len());

        for filter in &query.filters {
            let field = schema.field(&filter.field).ok_or_else(|| Error::UnknownField {
                field: filter.field.clone(),
            })?;
            if field.is_virtual() {
                return Err(Error::query_shape(format!(
                    "virtual field '{}' cannot be used in a query",
                    field.name
                )));
            }

            let ops: Vec<WhereOperator> = filter.conditions.iter().map(|c| c.op).collect();
            check_operator_combination(&field.name, &ops)?;

            let mut terms = Vec::with_capacity(filter.conditions.len());
            for condition in &filter.conditions {
                let value = match condition.op {
                    WhereOperator::In => {
                        let items = condition.value.as_array().filter(|a| !a.is_empty()).ok_or_else(
                            || {
                                Error::query_shape(format!(
                                    "$in on '{}' requires a non-empty array",
                                    field.name
                                ))
                            },
                        )?;
                        let values = items
                            .iter()
                            .map(|item| coerce_operand(field, item))
                            .collect::<Result<Vec<_>>>()?;
                        TermValue::List(values)
                    }
                    _ => TermValue::Single(coerce_operand(field, &condition.value)?),
                };
                terms.push(Term {
                    op: condition.op,
                    value,
                });
            }
            terms.sort_by_key(|t| t.op);

            restrictions.push(Restriction {
                field,
                role: schema.key().role(&field.name),
                terms,
            });
        }

        restrictions.sort_by_key(|r| match r.role {
            Some(KeyRole::Partition(i)) => (0, i),
            Some(KeyRole::Clustering(i)) => (1, i),
            None => (2, schema.position(&r.field.name).unwrap_or(usize::MAX)),
        });

        Ok(Self {
            schema,
            restrictions,
        })
    }

    pub fn restrictions(&self) -> &[Restriction<'a>] {
        &self.restrictions
    }

    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty()
    }

    fn get(&self, name: &str) -> Option<&Restriction<'a>> {
        self.restrictions.iter().find(|r| r.field.name == name)
    }

    fn is_eq_restricted(&self, name: &str) -> bool {
        self.get(name).is_some_and(|r| r.is_eq())
    }

    /// partition key 전체가 equality 또는 `$in`으로 제한되었는지
    pub fn restricts_partition(&self) -> bool {
        self.schema
            .key()
            .partition_key_fields()
            .iter()
            .all(|p| self.get(p).is_some_and(|r| !r.has_range()))
    }

    /// 조회용 배치 규칙 검사
    ///
    /// ALLOW FILTERING으로만 실행 가능한 제약이 있고 `allow_filtering`이 꺼져 있으면 거부합니다.
    pub fn check_select(&self, allow_filtering: bool) -> Result<()> {
        let mut needs_filtering = Vec::new();
        let full_partition = self.restricts_partition();

        let partition_touched = self
            .restrictions
            .iter()
            .any(|r| matches!(r.role, Some(KeyRole::Partition(_))));
        if partition_touched && !full_partition {
            needs_filtering.push(format!(
                "partition key ({}) is not fully restricted by equality or $in",
                self.schema.key().partition_key_fields().join(", ")
            ));
        }

        for r in &self.restrictions {
            let name = &r.field.name;
            match r.role {
                Some(KeyRole::Partition(i)) => {
                    if r.is_ranged() {
                        self.check_partition_range(i, name)?;
                    }
                }
                Some(KeyRole::Clustering(j)) => {
                    let clustering = self.schema.key().clustering_key_fields();
                    if let Some(gap) = clustering[..j].iter().find(|c| !self.is_eq_restricted(c)) {
                        if r.is_ranged() {
                            return Err(Error::query_shape(format!(
                                "clustering column '{}' cannot be restricted by range or $in: \
                                 preceding clustering column '{}' is not restricted by equality",
                                name, gap
                            )));
                        }
                        needs_filtering.push(format!(
                            "clustering column '{}' is restricted while '{}' is not",
                            name, gap
                        ));
                    } else if !full_partition {
                        needs_filtering.push(format!(
                            "clustering column '{}' is restricted without the full partition key",
                            name
                        ));
                    }
                }
                None => {
                    if r.is_ranged() {
                        return Err(Error::query_shape(format!(
                            "range and $in restrictions are not allowed on regular column '{}'",
                            name
                        )));
                    }
                    if !self.schema.is_indexed(name) {
                        needs_filtering.push(format!("column '{}' is not indexed", name));
                    }
                }
            }
        }

        if !needs_filtering.is_empty() && !allow_filtering {
            return Err(Error::query_shape(format!(
                "{}; enable allow_filtering to run this query",
                needs_filtering.join("; ")
            )));
        }
        Ok(())
    }

    fn check_partition_range(&self, index: usize, name: &str) -> Result<()> {
        let partition = self.schema.key().partition_key_fields();
        if index + 1 != partition.len() {
            return Err(Error::query_shape(format!(
                "range and $in restrictions are only allowed on the last partition key component, \
                 not '{}'",
                name
            )));
        }
        if let Some(missing) = partition[..index].iter().find(|p| !self.is_eq_restricted(p)) {
            return Err(Error::query_shape(format!(
                "partition key component '{}' must be restricted by equality before '{}'",
                missing, name
            )));
        }
        Ok(())
    }

    /// 변경(UPDATE)용 검사: 모든 primary key 컴포넌트가 equality 또는 `$in`
    pub fn check_full_key(&self) -> Result<()> {
        for name in self.schema.key().primary_key_fields() {
            match self.get(name) {
                Some(r) if !r.has_range() => {}
                Some(_) => {
                    return Err(Error::query_shape(format!(
                        "key column '{}' must be restricted by equality or $in",
                        name
                    )))
                }
                None => {
                    return Err(Error::query_shape(format!(
                        "every primary key column must be restricted, '{}' is missing",
                        name
                    )))
                }
            }
        }
        self.reject_regular_columns()
    }

    /// 삭제(DELETE)용 검사: partition key 전체 + clustering 접두사
    pub fn check_delete(&self) -> Result<()> {
        for name in self.schema.key().partition_key_fields() {
            match self.get(name) {
                Some(r) if !r.has_range() => {}
                _ => {
                    return Err(Error::query_shape(format!(
                        "partition key column '{}' must be restricted by equality or $in",
                        name
                    )))
                }
            }
        }

        let clustering = self.schema.key().clustering_key_fields();
        for (j, name) in clustering.iter().enumerate() {
            if self.get(name).is_none() {
                continue;
            }
            if let Some(gap) = clustering[..j].iter().find(|c| !self.is_eq_restricted(c)) {
                return Err(Error::query_shape(format!(
                    "clustering column '{}' cannot be restricted: preceding clustering column \
                     '{}' is not restricted by equality",
                    name, gap
                )));
            }
        }
        self.reject_regular_columns()
    }

    fn reject_regular_columns(&self) -> Result<()> {
        match self.restrictions.iter().find(|r| r.role.is_none()) {
            Some(r) => Err(Error::query_shape(format!(
                "regular column '{}' cannot be used to select rows to modify",
                r.field.name
            ))),
            None => Ok(()),
        }
    }

    /// WHERE 절 렌더링 (조건이 없으면 None)
    pub fn render(&self, params: &mut Vec<CqlValue>) -> Option<String> {
        if self.restrictions.is_empty() {
            return None;
        }

        let mut clauses = Vec::new();
        for r in &self.restrictions {
            let column = quote_ident(&r.field.name);
            for term in &r.terms {
                match &term.value {
                    TermValue::Single(v) => {
                        clauses.push(format!("{} {} ?", column, term.op.as_cql()));
                        params.push(v.clone());
                    }
                    TermValue::List(values) => {
                        let marks = vec!["?"; values.len()].join(", ");
                        clauses.push(format!("{} IN ({})", column, marks));
                        params.extend(values.iter().cloned());
                    }
                }
            }
        }
        Some(clauses.join(" AND "))
    }
}

fn check_operator_combination(field: &str, ops: &[WhereOperator]) -> Result<()> {
    if ops.len() <= 1 {
        return Ok(());
    }
    if ops.contains(&WhereOperator::In) {
        return Err(Error::query_shape(format!(
            "$in on '{}' cannot be combined with other operators",
            field
        )));
    }
    if ops.contains(&WhereOperator::Eq) {
        return Err(Error::query_shape(format!(
            "equality on '{}' cannot be combined with other operators",
            field
        )));
    }
    let lower = ops.iter().filter(|op| op.is_lower_bound()).count();
    if lower > 1 || ops.len() - lower > 1 {
        return Err(Error::query_shape(format!(
            "'{}' has more than one bound in the same direction",
            field
        )));
    }
    Ok(())
}

fn coerce_operand(field: &FieldDefinition, value: &serde_json::Value) -> Result<CqlValue> {
    if value.is_null() {
        return Err(Error::query_shape(format!(
            "null is not a valid filter value for '{}'",
            field.name
        )));
    }
    field.coerce(value)
}
