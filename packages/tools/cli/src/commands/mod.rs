//! CLI 명령어 구현

pub mod query;
pub mod schema;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clb_core::schema::{Schema, SchemaParser, SchemaSet};

/// 스키마 YAML 파일들을 하나의 집합으로 로드
pub fn load_schemas(paths: &[PathBuf]) -> anyhow::Result<SchemaSet> {
    if paths.is_empty() {
        anyhow::bail!("at least one --schema file is required");
    }

    let mut descriptions = Vec::new();
    for path in paths {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = SchemaParser::parse_yaml(&yaml)
            .with_context(|| format!("invalid schema in {}", path.display()))?;
        tracing::debug!("loaded {} model(s) from {}", parsed.len(), path.display());
        descriptions.extend(parsed);
    }

    Ok(SchemaParser::build_schema_set(descriptions)?)
}

/// 이름으로 모델 조회
pub fn find_model<'a>(schemas: &'a SchemaSet, name: &str) -> anyhow::Result<&'a Arc<Schema>> {
    schemas.get(name).ok_or_else(|| {
        let known: Vec<&str> = schemas.model_names().collect();
        anyhow::anyhow!("unknown model '{}' (known: {})", name, known.join(", "))
    })
}
