//! bind 단계와 컨텍스트
//!
//! `bind`는 keyspace를 준비하고 모든 모델 테이블을 라이브 정의와 조정한 뒤
//! 읽기 전용 `OrmContext`를 반환합니다. 프로세스 전역 레지스트리는 없습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use clb_core::id::IdGenerator;
use clb_core::schema::SchemaSet;
use clb_core::{Error, Result};
use clb_cql::{DdlGenerator, SchemaCompiler, TableState};

use crate::config::BindOptions;
use crate::driver::{DriverGateway, ExecOptions};
use crate::model::Model;

/// bind된 ORM 컨텍스트
pub struct OrmContext {
    driver: Arc<dyn DriverGateway>,
    options: BindOptions,
    schemas: SchemaSet,

    /// 모델 이름 → bind 시점의 테이블 상태
    table_states: BTreeMap<String, TableState>,
}

/// 스키마 집합을 스토어에 bind
///
/// 모델 이름 순서로 테이블을 조정하며, `SchemaMismatch`나 드라이버 에러에서 즉시 중단합니다.
pub async fn bind(
    driver: Arc<dyn DriverGateway>,
    options: BindOptions,
    schemas: SchemaSet,
) -> Result<OrmContext> {
    let exec = ExecOptions {
        consistency: options.consistency,
    };

    if options.create_keyspace {
        let statement =
            DdlGenerator::create_keyspace(&options.keyspace, &options.replication_strategy);
        driver.execute(&statement, &exec).await?;
    }

    let compiler = SchemaCompiler::new(Some(options.keyspace.clone()))
        .destructive_recreate(options.destructive_recreate_on_schema_change);

    let mut table_states = BTreeMap::new();
    for (name, schema) in schemas.iter() {
        let live = driver
            .describe_table(&options.keyspace, schema.table_name())
            .await?;

        let plan = compiler.plan(schema, live.as_ref())?;
        for statement in &plan.statements {
            driver.execute(statement, &exec).await?;
        }

        tracing::info!(
            "bound model {} to {}.{} ({:?} -> {:?})",
            name,
            options.keyspace,
            plan.table,
            plan.initial_state,
            plan.action.resulting_state()
        );
        table_states.insert(name.clone(), plan.action.resulting_state());
    }

    Ok(OrmContext {
        driver,
        options,
        schemas,
        table_states,
    })
}

impl OrmContext {
    /// 모델 핸들
    pub fn model(&self, name: &str) -> Result<Model> {
        let schema = self.schemas.get(name).ok_or_else(|| Error::UnknownModel {
            name: name.to_string(),
        })?;

        Ok(Model::new(
            Arc::clone(schema),
            Arc::clone(&self.driver),
            self.options.keyspace.clone(),
            ExecOptions {
                consistency: self.options.consistency,
            },
        ))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.model_names()
    }

    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    pub fn keyspace(&self) -> &str {
        &self.options.keyspace
    }

    /// bind 후의 테이블 상태 (bind되지 않은 모델이면 None)
    pub fn table_state(&self, model: &str) -> Option<TableState> {
        self.table_states.get(model).copied()
    }

    /// 랜덤 UUID (v4)
    pub fn uuid(&self) -> String {
        IdGenerator::new_random_id()
    }

    /// 시간 기반 UUID (v1, timeuuid 컬럼용)
    pub fn timeuuid(&self) -> String {
        IdGenerator::new_time_ordered_id()
    }
}
