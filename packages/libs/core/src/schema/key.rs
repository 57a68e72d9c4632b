//! 키 모델
//!
//! partition key / clustering key 구조를 정의합니다.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::field::FieldDefinition;
use super::types::ColumnType;
use crate::error::{Error, Result};

/// 정렬 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn reverse(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn as_cql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// 키 안에서의 필드 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// partition key의 n번째 컴포넌트
    Partition(usize),

    /// clustering key의 n번째 컴포넌트
    Clustering(usize),
}

/// 키 모델
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyModel {
    partition: Vec<String>,
    clustering: Vec<String>,
    /// clustering 컴포넌트별 정렬 순서 (clustering과 같은 길이)
    clustering_order: Vec<SortOrder>,
}

impl KeyModel {
    /// 키 모델 생성 및 검증
    ///
    /// 모든 컴포넌트는 선언된 저장 필드를 참조해야 하며, partition key는 비어 있을 수 없습니다.
    pub fn new(
        partition: Vec<String>,
        clustering: Vec<String>,
        order: &[(String, SortOrder)],
        fields: &[FieldDefinition],
    ) -> Result<Self> {
        if partition.is_empty() {
            return Err(Error::InvalidKeySpec {
                message: "partition key must have at least one component".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for name in partition.iter().chain(clustering.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidKeySpec {
                    message: format!("key component '{}' appears more than once", name),
                });
            }

            let field = fields
                .iter()
                .find(|f| &f.name == name)
                .ok_or_else(|| Error::InvalidKeySpec {
                    message: format!("key component '{}' is not a declared field", name),
                })?;

            if field.is_virtual() {
                return Err(Error::InvalidKeySpec {
                    message: format!("key component '{}' is a virtual field", name),
                });
            }

            match &field.column_type {
                Some(t) if t.is_collection() => {
                    return Err(Error::InvalidKeySpec {
                        message: format!(
                            "key component '{}' has non-frozen collection type {}",
                            name, t
                        ),
                    });
                }
                Some(ColumnType::Counter) => {
                    return Err(Error::InvalidKeySpec {
                        message: format!("key component '{}' cannot be a counter", name),
                    });
                }
                _ => {}
            }
        }

        for (name, _) in order {
            if !clustering.contains(name) {
                return Err(Error::InvalidKeySpec {
                    message: format!(
                        "clustering order references '{}' which is not a clustering key",
                        name
                    ),
                });
            }
        }

        let clustering_order = clustering
            .iter()
            .map(|c| {
                order
                    .iter()
                    .find(|(name, _)| name == c)
                    .map(|(_, o)| *o)
                    .unwrap_or_default()
            })
            .collect();

        Ok(Self {
            partition,
            clustering,
            clustering_order,
        })
    }

    /// partition key 컴포넌트 (순서 유지)
    pub fn partition_key_fields(&self) -> &[String] {
        &self.partition
    }

    /// clustering key 컴포넌트 (순서 유지)
    pub fn clustering_key_fields(&self) -> &[String] {
        &self.clustering
    }

    /// compound partition key 여부
    pub fn is_compound_partition(&self) -> bool {
        self.partition.len() > 1
    }

    /// partition + clustering 전체 (primary key 순서)
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &String> {
        self.partition.iter().chain(self.clustering.iter())
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.role(name).is_some()
    }

    /// 필드의 키 역할
    pub fn role(&self, name: &str) -> Option<KeyRole> {
        if let Some(pos) = self.partition.iter().position(|p| p == name) {
            return Some(KeyRole::Partition(pos));
        }
        self.clustering
            .iter()
            .position(|c| c == name)
            .map(KeyRole::Clustering)
    }

    /// clustering 컴포넌트의 선언된 정렬 순서
    pub fn clustering_order(&self, name: &str) -> Option<SortOrder> {
        self.clustering
            .iter()
            .position(|c| c == name)
            .map(|pos| self.clustering_order[pos])
    }

    /// clustering 정렬 순서 목록 (clustering key와 같은 순서)
    pub fn clustering_orders(&self) -> impl Iterator<Item = (&String, SortOrder)> {
        self.clustering
            .iter()
            .zip(self.clustering_order.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldSpec;

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::define("id", FieldSpec::typed("uuid")).unwrap(),
            FieldDefinition::define("ts", FieldSpec::typed("timestamp")).unwrap(),
            FieldDefinition::define("seq", FieldSpec::typed("int")).unwrap(),
            FieldDefinition::define("tags", FieldSpec::typed("set<text>")).unwrap(),
            FieldDefinition::define(
                "label",
                FieldSpec::virtual_field().getter(|_| serde_json::Value::Null),
            )
            .unwrap(),
        ]
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_key_model_roles() {
        let key = KeyModel::new(
            names(&["id"]),
            names(&["ts", "seq"]),
            &[("ts".to_string(), SortOrder::Desc)],
            &fields(),
        )
        .unwrap();

        assert_eq!(key.partition_key_fields(), &names(&["id"])[..]);
        assert_eq!(key.clustering_key_fields(), &names(&["ts", "seq"])[..]);
        assert!(!key.is_compound_partition());
        assert_eq!(key.role("seq"), Some(KeyRole::Clustering(1)));
        assert_eq!(key.clustering_order("ts"), Some(SortOrder::Desc));
        assert_eq!(key.clustering_order("seq"), Some(SortOrder::Asc));
        assert_eq!(key.role("tags"), None);
    }

    #[test]
    fn test_compound_partition() {
        let key = KeyModel::new(names(&["id", "seq"]), vec![], &[], &fields()).unwrap();
        assert!(key.is_compound_partition());
    }

    #[test]
    fn test_empty_partition_rejected() {
        let err = KeyModel::new(vec![], names(&["ts"]), &[], &fields()).unwrap_err();
        assert!(matches!(err, Error::InvalidKeySpec { .. }));
    }

    #[test]
    fn test_undeclared_component_rejected() {
        let err = KeyModel::new(names(&["nope"]), vec![], &[], &fields()).unwrap_err();
        assert!(matches!(err, Error::InvalidKeySpec { .. }));
    }

    #[test]
    fn test_virtual_and_collection_components_rejected() {
        assert!(KeyModel::new(names(&["label"]), vec![], &[], &fields()).is_err());
        assert!(KeyModel::new(names(&["id"]), names(&["tags"]), &[], &fields()).is_err());
    }

    #[test]
    fn test_duplicate_and_bad_order_rejected() {
        assert!(KeyModel::new(names(&["id"]), names(&["id"]), &[], &fields()).is_err());
        assert!(KeyModel::new(
            names(&["id"]),
            names(&["ts"]),
            &[("seq".to_string(), SortOrder::Desc)],
            &fields()
        )
        .is_err());
    }
}
