//! Schema Compiler
//!
//! 스키마에서 계산한 목표 테이블 정의를 스토어의 라이브 정의와 비교하여
//! 생성 / 변경 없음 / ALTER / 삭제 후 재생성 중 하나를 결정합니다.
//!
//! ```text
//! Absent ──CREATE──▶ Created
//! live == target ──▶ InSync
//! 새 일반 컬럼만 추가 ──ALTER ADD──▶ Altered
//! 그 외 차이 ──destructive──▶ Recreated
//!            └─otherwise──▶ Diverged (SchemaMismatch)
//! ```

use clb_core::schema::{Schema, TableDefinition};
use clb_core::{Error, Result};

use crate::ddl::DdlGenerator;
use crate::statement::Statement;

/// 테이블 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Absent,
    Created,
    InSync,
    Diverged,
    Altered,
    Recreated,
}

/// 조정 결과로 수행할 작업
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    None,
    Alter,
    Recreate,
}

impl PlanAction {
    /// 작업 실행 후의 테이블 상태
    pub fn resulting_state(&self) -> TableState {
        match self {
            PlanAction::Create => TableState::Created,
            PlanAction::None => TableState::InSync,
            PlanAction::Alter => TableState::Altered,
            PlanAction::Recreate => TableState::Recreated,
        }
    }
}

/// 조정 계획
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPlan {
    pub table: String,

    /// 비교 시점의 상태 (Absent / InSync / Diverged)
    pub initial_state: TableState,
    pub action: PlanAction,

    /// 순서대로 실행할 DDL
    pub statements: Vec<Statement>,

    /// 라이브 정의와의 차이 (사람이 읽는 형태)
    pub differences: Vec<String>,
}

/// 목표 정의와 라이브 정의의 차이
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDiff {
    /// ALTER ADD로 처리 가능한 새 일반 컬럼 (이름, 타입)
    pub added_columns: Vec<(String, String)>,

    /// 재생성이 필요한 차이
    pub incompatible: Vec<String>,
}

impl TableDiff {
    /// 두 정의를 정규화한 뒤 비교
    pub fn between(target: &TableDefinition, live: &TableDefinition) -> Self {
        let target = target.normalized();
        let live = live.normalized();
        let mut diff = Self::default();

        if target.partition_key != live.partition_key {
            diff.incompatible.push(format!(
                "partition key changed from {:?} to {:?}",
                live.partition_key, target.partition_key
            ));
        }
        if target.clustering_key != live.clustering_key {
            diff.incompatible.push(format!(
                "clustering key changed from {:?} to {:?}",
                live.clustering_key, target.clustering_key
            ));
        } else if target.clustering_order != live.clustering_order {
            diff.incompatible
                .push("clustering order changed".to_string());
        }

        for (column, cql_type) in &target.columns {
            match live.columns.get(column) {
                None if target.is_key(column) => diff
                    .incompatible
                    .push(format!("new key column '{}'", column)),
                None if target.indexes.contains(column) => diff
                    .incompatible
                    .push(format!("new indexed column '{}'", column)),
                None => diff.added_columns.push((column.clone(), cql_type.clone())),
                Some(live_type) if live_type != cql_type => diff.incompatible.push(format!(
                    "column '{}' type changed from {} to {}",
                    column, live_type, cql_type
                )),
                Some(_) => {}
            }
        }
        for column in live.columns.keys() {
            if !target.columns.contains_key(column) {
                diff.incompatible
                    .push(format!("column '{}' was removed", column));
            }
        }

        for column in target.indexes.difference(&live.indexes) {
            if live.columns.contains_key(column) {
                diff.incompatible
                    .push(format!("index on '{}' is missing", column));
            }
        }
        for column in live.indexes.difference(&target.indexes) {
            diff.incompatible
                .push(format!("unexpected index on '{}'", column));
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty() && self.incompatible.is_empty()
    }

    /// 사람이 읽는 차이 목록
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .added_columns
            .iter()
            .map(|(c, t)| format!("new column '{}' {}", c, t))
            .collect();
        lines.extend(self.incompatible.iter().cloned());
        lines
    }
}

/// Schema Compiler
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    keyspace: Option<String>,
    destructive_recreate: bool,
}

impl SchemaCompiler {
    pub fn new(keyspace: Option<String>) -> Self {
        Self {
            keyspace,
            destructive_recreate: false,
        }
    }

    /// 호환되지 않는 차이가 있을 때 테이블을 삭제 후 재생성할지
    pub fn destructive_recreate(mut self, enabled: bool) -> Self {
        self.destructive_recreate = enabled;
        self
    }

    /// 조정 계획 수립
    ///
    /// 호환되지 않는 차이가 있고 재생성이 꺼져 있으면 `SchemaMismatch`를 반환하며 DDL은 없습니다.
    pub fn plan(&self, schema: &Schema, live: Option<&TableDefinition>) -> Result<SchemaPlan> {
        let target = schema.table_definition();
        let keyspace = self.keyspace.as_deref();

        let Some(live) = live else {
            tracing::info!("table {} is absent, creating", target.name);
            return Ok(SchemaPlan {
                table: target.name.clone(),
                initial_state: TableState::Absent,
                action: PlanAction::Create,
                statements: DdlGenerator::generate(keyspace, &target),
                differences: Vec::new(),
            });
        };

        let diff = TableDiff::between(&target, live);
        if diff.is_empty() {
            tracing::debug!("table {} is in sync", target.name);
            return Ok(SchemaPlan {
                table: target.name,
                initial_state: TableState::InSync,
                action: PlanAction::None,
                statements: Vec::new(),
                differences: Vec::new(),
            });
        }

        if diff.incompatible.is_empty() {
            tracing::info!(
                "table {} gains {} column(s)",
                target.name,
                diff.added_columns.len()
            );
            let statements = diff
                .added_columns
                .iter()
                .map(|(column, cql_type)| {
                    DdlGenerator::add_column(keyspace, &target.name, column, cql_type)
                })
                .collect();
            return Ok(SchemaPlan {
                table: target.name.clone(),
                initial_state: TableState::Diverged,
                action: PlanAction::Alter,
                statements,
                differences: diff.describe(),
            });
        }

        if !self.destructive_recreate {
            tracing::info!(
                "table {} diverged from its schema: {}",
                target.name,
                diff.incompatible.join("; ")
            );
            return Err(Error::SchemaMismatch {
                table: target.name,
                issues: diff.describe(),
            });
        }

        tracing::warn!(
            "dropping and recreating table {}: {}",
            target.name,
            diff.incompatible.join("; ")
        );
        let mut statements = vec![DdlGenerator::drop_table(keyspace, &target.name)];
        statements.extend(DdlGenerator::generate(keyspace, &target));
        Ok(SchemaPlan {
            table: target.name.clone(),
            initial_state: TableState::Diverged,
            action: PlanAction::Recreate,
            statements,
            differences: diff.describe(),
        })
    }
}
