//! Schema IR
//!
//! 선언 스키마 설명(`SchemaDescription`)을 한 번 컴파일해 만드는 불변 스키마입니다.
//! 인스턴스, 쿼리 번역기, Schema Compiler가 `Arc<Schema>`로 공유합니다.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use super::field::{is_identifier, FieldDefinition, FieldSpec};
use super::key::{KeyModel, SortOrder};
use super::table::TableDefinition;
use crate::error::{Error, Result};

/// 스키마 설명 (선언 값 타입)
#[derive(Clone, Default)]
pub struct SchemaDescription {
    /// 모델 이름
    pub model_name: String,

    /// 테이블 이름 (생략 시 모델 이름의 소문자)
    pub table_name: Option<String>,

    /// 필드 선언 (선언 순서 유지)
    pub fields: Vec<(String, FieldSpec)>,

    /// partition key 컴포넌트
    pub partition_key: Vec<String>,

    /// clustering key 컴포넌트
    pub clustering_key: Vec<String>,

    /// clustering 정렬 순서
    pub clustering_order: Vec<(String, SortOrder)>,

    /// secondary index 필드
    pub indexes: Vec<String>,
}

impl SchemaDescription {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    pub fn partition_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_key = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn clustering_key<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clustering_key = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn clustering_order(mut self, name: impl Into<String>, order: SortOrder) -> Self {
        self.clustering_order.push((name.into(), order));
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(name.into());
        self
    }
}

/// 컴파일된 스키마
#[derive(Debug, Clone)]
pub struct Schema {
    model_name: String,
    table_name: String,
    fields: Vec<FieldDefinition>,
    key: KeyModel,
    indexes: BTreeSet<String>,
}

impl Schema {
    /// 스키마 설명 컴파일
    pub fn compile(desc: SchemaDescription) -> Result<Self> {
        let table_name = desc
            .table_name
            .clone()
            .unwrap_or_else(|| desc.model_name.to_ascii_lowercase());

        if !is_identifier(&table_name) {
            return Err(Error::SchemaParse {
                message: format!("invalid table name '{}'", table_name),
            });
        }

        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(desc.fields.len());
        for (name, spec) in desc.fields {
            if !names.insert(name.clone()) {
                return Err(Error::InvalidFieldSpec {
                    field: name,
                    message: "duplicate field name".to_string(),
                });
            }
            fields.push(FieldDefinition::define(name, spec)?);
        }

        let key = KeyModel::new(
            desc.partition_key,
            desc.clustering_key,
            &desc.clustering_order,
            &fields,
        )?;

        let mut indexes = BTreeSet::new();
        for name in desc.indexes {
            let field = fields
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| Error::InvalidFieldSpec {
                    field: name.clone(),
                    message: "index references an undeclared field".to_string(),
                })?;
            if field.is_virtual() {
                return Err(Error::InvalidFieldSpec {
                    field: name,
                    message: "virtual field cannot be indexed".to_string(),
                });
            }
            indexes.insert(name);
        }

        Ok(Self {
            model_name: desc.model_name,
            table_name,
            fields,
            key,
            indexes,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// 모든 필드 (선언 순서)
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// 필드 조회
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 필드 선언 위치
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// 저장 필드 (컬럼이 있는 필드)
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_persisted())
    }

    /// virtual 필드
    pub fn virtual_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_virtual())
    }

    pub fn key(&self) -> &KeyModel {
        &self.key
    }

    pub fn indexes(&self) -> &BTreeSet<String> {
        &self.indexes
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        self.indexes.contains(name)
    }

    /// 스키마에서 계산한 목표 테이블 정의
    ///
    /// 캐시하지 않고 호출할 때마다 다시 계산합니다.
    pub fn table_definition(&self) -> TableDefinition {
        let columns = self
            .persisted_fields()
            .filter_map(|f| {
                f.column_type
                    .as_ref()
                    .map(|t| (f.name.clone(), t.cql_name()))
            })
            .collect();

        let clustering_order = self
            .key
            .clustering_orders()
            .map(|(name, order)| (name.clone(), order))
            .collect();

        TableDefinition {
            name: self.table_name.clone(),
            columns,
            partition_key: self.key.partition_key_fields().to_vec(),
            clustering_key: self.key.clustering_key_fields().to_vec(),
            clustering_order,
            indexes: self.indexes.clone(),
        }
    }
}

/// 로드된 모델 스키마 집합
///
/// 모델 이름 → 스키마. 프로세스 전역 레지스트리 대신 bind 단계에 명시적으로 전달됩니다.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    models: BTreeMap<String, Arc<Schema>>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 스키마 추가 (모델/테이블 이름 중복 불가)
    pub fn add(&mut self, schema: Schema) -> Result<Arc<Schema>> {
        let duplicate_table = self
            .models
            .values()
            .any(|s| s.table_name() == schema.table_name());
        if self.models.contains_key(schema.model_name()) || duplicate_table {
            return Err(Error::DuplicateModel {
                name: schema.model_name().to_string(),
            });
        }

        let schema = Arc::new(schema);
        self.models
            .insert(schema.model_name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, model_name: &str) -> Option<&Arc<Schema>> {
        self.models.get(model_name)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<Schema>)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
