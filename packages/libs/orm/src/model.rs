//! 모델 핸들
//!
//! bind된 모델 하나에 대한 조회 / 저장 / 삭제 / 갱신 연산입니다.
//! 검증, 기본값 해석, CQL 생성은 모두 동기적으로 끝난 뒤 드라이버 호출을 기다립니다.

use std::sync::Arc;

use serde_json::{Map, Value};

use clb_core::schema::Schema;
use clb_core::{CqlValue, Error, Instance, Result};
use clb_cql::{
    DeleteBuilder, InsertBuilder, QueryObject, QueryOptions, SaveOptions, SelectBuilder,
    UpdateBuilder,
};

use crate::driver::{DriverGateway, ExecOptions, Row};

/// 조회 결과
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// 하이드레이션된 인스턴스
    Instances(Vec<Instance>),

    /// 원시 행 (`raw` 옵션)
    Rows(Vec<Map<String, Value>>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Instances(v) => v.len(),
            QueryResult::Rows(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_instances(self) -> Option<Vec<Instance>> {
        match self {
            QueryResult::Instances(v) => Some(v),
            QueryResult::Rows(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Map<String, Value>>> {
        match self {
            QueryResult::Rows(v) => Some(v),
            QueryResult::Instances(_) => None,
        }
    }

    /// JSON 배열 (인스턴스는 getter가 있는 virtual 필드 포함)
    pub fn to_json(&self) -> Value {
        match self {
            QueryResult::Instances(v) => Value::Array(v.iter().map(Instance::to_json).collect()),
            QueryResult::Rows(v) => Value::Array(v.iter().cloned().map(Value::Object).collect()),
        }
    }
}

/// 모델 핸들
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    driver: Arc<dyn DriverGateway>,
    keyspace: String,
    exec: ExecOptions,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("model", &self.schema.model_name())
            .field("keyspace", &self.keyspace)
            .finish()
    }
}

impl Model {
    pub(crate) fn new(
        schema: Arc<Schema>,
        driver: Arc<dyn DriverGateway>,
        keyspace: String,
        exec: ExecOptions,
    ) -> Self {
        Self {
            schema,
            driver,
            keyspace,
            exec,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.model_name()
    }

    /// 새 인스턴스 생성 (검증 + 기본값)
    pub fn new_instance(&self, initial: Map<String, Value>) -> Result<Instance> {
        Instance::construct(Arc::clone(&self.schema), initial)
    }

    /// JSON 쿼리 객체로 조회
    pub async fn find(&self, query: &Value, options: &QueryOptions) -> Result<QueryResult> {
        let query = QueryObject::parse(query)?;
        self.find_with(&query, options).await
    }

    /// 파싱된 쿼리 객체로 조회
    pub async fn find_with(&self, query: &QueryObject, options: &QueryOptions) -> Result<QueryResult> {
        let compiled = SelectBuilder::new(&self.schema)
            .keyspace(Some(self.keyspace.as_str()))
            .build(query, options)?;

        let rows = self.driver.execute(&compiled.statement, &self.exec).await?;
        tracing::debug!("{} returned {} row(s)", self.name(), rows.len());

        if compiled.raw {
            return Ok(QueryResult::Rows(rows.iter().map(row_to_json).collect()));
        }
        Ok(QueryResult::Instances(
            rows.iter()
                .map(|row| Instance::hydrate(Arc::clone(&self.schema), row_to_json(row)))
                .collect(),
        ))
    }

    /// 첫 번째 인스턴스 조회 (`$limit`은 1로 대체)
    pub async fn find_one(&self, query: &Value, options: &QueryOptions) -> Result<Option<Instance>> {
        let mut query = QueryObject::parse(query)?;
        query.limit = Some(Value::from(1));
        let options = QueryOptions {
            raw: false,
            ..options.clone()
        };

        let found = self.find_with(&query, &options).await?;
        Ok(found.into_instances().and_then(|v| v.into_iter().next()))
    }

    /// 인스턴스 저장 (upsert)
    ///
    /// `IF NOT EXISTS`로 적용되지 않았으면 `false`를 반환합니다.
    /// 스토어가 계산한 기본값은 다시 읽기 전까지 인스턴스에 반영되지 않습니다.
    pub async fn save(&self, instance: &Instance, options: &SaveOptions) -> Result<bool> {
        self.check_owner(instance)?;
        let statement = InsertBuilder::new(&self.schema)
            .keyspace(Some(self.keyspace.as_str()))
            .build(instance, options)?;

        let rows = self.driver.execute(&statement, &self.exec).await?;
        let applied = !matches!(
            rows.first().and_then(|row| row.get("[applied]")),
            Some(CqlValue::Boolean(false))
        );
        if !applied {
            tracing::debug!("insert into {} was not applied", self.name());
        }
        Ok(applied)
    }

    /// 인스턴스 삭제 (모든 key 값으로 식별)
    pub async fn delete(&self, instance: &Instance) -> Result<()> {
        self.check_owner(instance)?;
        let statement = DeleteBuilder::new(&self.schema)
            .keyspace(Some(self.keyspace.as_str()))
            .build_for_instance(instance)?;

        self.driver.execute(&statement, &self.exec).await?;
        Ok(())
    }

    /// 쿼리로 식별한 행 갱신
    pub async fn update(&self, query: &Value, values: &Value, options: &SaveOptions) -> Result<()> {
        let query = QueryObject::parse(query)?;
        let values = values.as_object().ok_or_else(|| {
            Error::query_shape(format!("update values must be an object, got {}", values))
        })?;

        let statement = UpdateBuilder::new(&self.schema)
            .keyspace(Some(self.keyspace.as_str()))
            .build(&query, values, options)?;

        self.driver.execute(&statement, &self.exec).await?;
        Ok(())
    }

    /// 쿼리로 식별한 행 삭제
    pub async fn delete_where(&self, query: &Value) -> Result<()> {
        let query = QueryObject::parse(query)?;
        let statement = DeleteBuilder::new(&self.schema)
            .keyspace(Some(self.keyspace.as_str()))
            .build(&query)?;

        self.driver.execute(&statement, &self.exec).await?;
        Ok(())
    }

    fn check_owner(&self, instance: &Instance) -> Result<()> {
        if instance.schema().model_name() != self.name() {
            return Err(Error::query_shape(format!(
                "instance of '{}' cannot be persisted through model '{}'",
                instance.schema().model_name(),
                self.name()
            )));
        }
        Ok(())
    }
}

/// 결과 행을 JSON 객체로 변환
fn row_to_json(row: &Row) -> Map<String, Value> {
    row.iter()
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect()
}
