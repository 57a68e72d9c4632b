//! 테이블 정의
//!
//! 스토어가 보고하는 라이브 테이블 정의이자, 스키마에서 계산되는 목표 정의입니다.
//! Schema Compiler는 두 정의를 정규화한 뒤 비교합니다.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::key::SortOrder;
use super::types::TypeRegistry;

/// 테이블 정의
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// 테이블 이름
    pub name: String,

    /// 컬럼 이름 → CQL 타입
    pub columns: BTreeMap<String, String>,

    /// partition key (순서 유지)
    pub partition_key: Vec<String>,

    /// clustering key (순서 유지)
    #[serde(default)]
    pub clustering_key: Vec<String>,

    /// clustering 컬럼별 정렬 순서 (생략 시 asc)
    #[serde(default)]
    pub clustering_order: BTreeMap<String, SortOrder>,

    /// secondary index가 걸린 컬럼
    #[serde(default)]
    pub indexes: BTreeSet<String>,
}

impl TableDefinition {
    /// 비교용 정규화
    ///
    /// 타입 이름을 정규화하고 clustering 정렬 순서의 기본값(asc)을 채웁니다.
    pub fn normalized(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, t)| (name.clone(), TypeRegistry::normalize(t)))
            .collect();

        let clustering_order = self
            .clustering_key
            .iter()
            .map(|c| {
                (
                    c.clone(),
                    self.clustering_order.get(c).copied().unwrap_or_default(),
                )
            })
            .collect();

        Self {
            name: self.name.clone(),
            columns,
            partition_key: self.partition_key.clone(),
            clustering_key: self.clustering_key.clone(),
            clustering_order,
            indexes: self.indexes.clone(),
        }
    }

    /// primary key 컬럼 여부
    pub fn is_key(&self, column: &str) -> bool {
        self.partition_key.iter().any(|c| c == column)
            || self.clustering_key.iter().any(|c| c == column)
    }
}
