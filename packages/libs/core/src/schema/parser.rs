//! 스키마 YAML 파서
//!
//! 모델 소스(YAML 문서)를 파싱하여 `SchemaDescription` → `Schema`로 변환합니다.
//!
//! ```yaml
//! version: 1
//! models:
//!   person:
//!     fields:
//!       id: uuid
//!       name: { type: text, default: "no name" }
//!       age:
//!         type: int
//!         rule: { validator: "value > 0", message: "must be > 0, got {value}" }
//!       created: { type: timestamp, default: { $db_function: "toTimestamp(now())" } }
//!       complete_name: { type: text, virtual: { get: "name + ' ' + surname" } }
//!     key: [[id], created]
//!     clustering_order: { created: desc }
//!     indexes: [name]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::expr::CelExpr;
use super::field::{DefaultValue, FieldSpec, ValidationRule, VirtualAccessor};
use super::ir::{Schema, SchemaDescription, SchemaSet};
use super::key::SortOrder;
use super::types::TypeRegistry;
use crate::error::{Error, Result};
use crate::id::{IdGenerator, IdStrategy};
use crate::instance::Instance;

/// 스키마 파서
pub struct SchemaParser;

impl SchemaParser {
    /// 단일 YAML 문자열 파싱
    pub fn parse_yaml(yaml: &str) -> Result<Vec<SchemaDescription>> {
        let raw: RawSchema = serde_yaml::from_str(yaml)?;
        if raw.version != 1 {
            return Err(Error::SchemaParse {
                message: format!("unsupported schema version {}", raw.version),
            });
        }

        raw.models
            .into_iter()
            .map(|(name, model)| Self::convert_raw_model(name, model))
            .collect()
    }

    /// 여러 YAML 문서(모델 소스)를 파싱하여 SchemaSet 생성
    pub fn parse_multiple(yamls: &[&str]) -> Result<SchemaSet> {
        let mut all = Vec::new();
        for yaml in yamls {
            all.extend(Self::parse_yaml(yaml)?);
        }
        Self::build_schema_set(all)
    }

    /// 스키마 설명 목록을 컴파일하여 SchemaSet 생성
    pub fn build_schema_set(descriptions: Vec<SchemaDescription>) -> Result<SchemaSet> {
        let mut set = SchemaSet::new();
        for desc in descriptions {
            set.add(Schema::compile(desc)?)?;
        }
        Ok(set)
    }

    /// Raw 모델을 SchemaDescription으로 변환
    fn convert_raw_model(name: String, raw: RawModel) -> Result<SchemaDescription> {
        let mut desc = SchemaDescription::new(name);
        desc.table_name = raw.table_name;

        for (field_name, raw_field) in raw.fields {
            let spec = Self::convert_raw_field(&field_name, raw_field)?;
            desc.fields.push((field_name, spec));
        }

        let (partition, clustering) = Self::convert_key(raw.key)?;
        desc.partition_key = partition;
        desc.clustering_key = clustering;

        for (column, order) in raw.clustering_order {
            let order: SortOrder = serde_json::from_value(order).map_err(|e| Error::SchemaParse {
                message: format!("invalid clustering order for '{}': {}", column, e),
            })?;
            desc.clustering_order.push((column, order));
        }

        desc.indexes = raw.indexes;
        Ok(desc)
    }

    /// Raw 필드 변환 (`type` 축약형 또는 전체 객체)
    fn convert_raw_field(name: &str, raw: Value) -> Result<FieldSpec> {
        let raw: RawField = match raw {
            Value::String(type_name) => return Ok(FieldSpec::typed(type_name)),
            other => serde_json::from_value(other).map_err(|e| Error::SchemaParse {
                message: format!("invalid field '{}': {}", name, e),
            })?,
        };

        let mut spec = FieldSpec {
            type_name: raw.column_type,
            ..Default::default()
        };

        if let Some(default) = raw.default {
            spec.default = Some(Self::convert_default(name, spec.type_name.as_deref(), default)?);
        }
        if let Some(rule) = raw.rule {
            spec.rule = Some(Self::convert_rule(name, rule)?);
        }
        if let Some(raw_virtual) = raw.r#virtual {
            spec.is_virtual = true;
            spec.accessor = Self::convert_virtual(name, raw_virtual)?;
        }

        Ok(spec)
    }

    /// 기본값 변환
    ///
    /// `$db_function`, `$generate`, `$compute` 중 하나를 가진 단일 키 객체는 특수 기본값,
    /// 그 외는 리터럴입니다. `$generate`는 생성 값이 필드 타입에 맞아야 합니다.
    fn convert_default(name: &str, type_name: Option<&str>, raw: Value) -> Result<DefaultValue> {
        let special = match &raw {
            Value::Object(obj) if obj.len() == 1 => obj
                .iter()
                .next()
                .filter(|(k, _)| k.starts_with('$'))
                .map(|(k, v)| (k.clone(), v.clone())),
            _ => None,
        };

        let Some((key, value)) = special else {
            return Ok(DefaultValue::Literal(raw));
        };
        let text = value.as_str().ok_or_else(|| invalid_field(name, format!("{} expects a string", key)))?;

        match key.as_str() {
            "$db_function" => Ok(DefaultValue::Database(text.to_string())),
            "$generate" => {
                let strategy = IdStrategy::from_str(text)
                    .ok_or_else(|| invalid_field(name, format!("unknown generator '{}'", text)))?;

                // 알 수 없는 타입은 필드 정의 단계에서 보고됨
                if let Some(column_type) = type_name.and_then(|t| TypeRegistry::resolve(t).ok()) {
                    if !column_type.validate(&IdGenerator::generate(strategy)) {
                        return Err(invalid_field(
                            name,
                            format!(
                                "generator '{}' produces {} values, field type is {}",
                                text,
                                strategy.default_type(),
                                column_type
                            ),
                        ));
                    }
                }
                Ok(DefaultValue::Computed(Arc::new(move |_: &Instance| {
                    IdGenerator::generate(strategy)
                })))
            }
            "$compute" => {
                let expr = CelExpr::compile(text).map_err(|e| invalid_field(name, e))?;
                let field = name.to_string();
                Ok(DefaultValue::Computed(Arc::new(move |inst: &Instance| {
                    expr.eval(inst.variables()).unwrap_or_else(|e| {
                        tracing::warn!("computed default for {} failed: {}", field, e);
                        Value::Null
                    })
                })))
            }
            other => Err(invalid_field(name, format!("unknown default directive '{}'", other))),
        }
    }

    /// 검증 규칙 변환 (CEL validator, `{value}` 메시지 템플릿)
    fn convert_rule(name: &str, raw: RawRule) -> Result<ValidationRule> {
        let expr = CelExpr::compile(&raw.validator).map_err(|e| invalid_field(name, e))?;
        let field = name.to_string();

        let mut rule = ValidationRule::new(move |value| {
            expr.eval_bool([("value".to_string(), value.clone())])
                .unwrap_or_else(|e| {
                    tracing::warn!("validator for {} failed to evaluate: {}", field, e);
                    false
                })
        })
        .ignore_default(raw.ignore_default);

        if let Some(template) = raw.message {
            rule = if template.contains("{value}") {
                rule.with_message_fn(move |value| template.replace("{value}", &display_value(value)))
            } else {
                rule.with_message(template)
            };
        }

        Ok(rule)
    }

    /// virtual accessor 변환 (`get`: CEL getter)
    ///
    /// setter는 선언 YAML로 표현할 수 없으므로 Rust API(`FieldSpec::setter`)로만 지정합니다.
    fn convert_virtual(name: &str, raw: RawVirtual) -> Result<VirtualAccessor> {
        let mut accessor = VirtualAccessor::default();
        if let Some(source) = raw.get {
            let expr = CelExpr::compile(&source).map_err(|e| invalid_field(name, e))?;
            let field = name.to_string();
            accessor.get = Some(Arc::new(move |inst: &Instance| {
                expr.eval(inst.variables()).unwrap_or_else(|e| {
                    tracing::warn!("getter for {} failed: {}", field, e);
                    Value::Null
                })
            }));
        }
        Ok(accessor)
    }

    /// 키 변환: 첫 요소는 partition key (문자열 또는 목록), 나머지는 clustering key
    fn convert_key(raw: Vec<RawKeyPart>) -> Result<(Vec<String>, Vec<String>)> {
        let mut parts = raw.into_iter();
        let partition = match parts.next() {
            Some(RawKeyPart::One(name)) => vec![name],
            Some(RawKeyPart::Many(names)) => names,
            None => Vec::new(),
        };

        let clustering = parts
            .map(|part| match part {
                RawKeyPart::One(name) => Ok(name),
                RawKeyPart::Many(_) => Err(Error::InvalidKeySpec {
                    message: "only the first key element may be a compound partition key"
                        .to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((partition, clustering))
    }
}

fn invalid_field(name: &str, message: impl Into<String>) -> Error {
    Error::InvalidFieldSpec {
        field: name.to_string(),
        message: message.into(),
    }
}

/// 메시지 템플릿용 값 표시 (문자열은 따옴표 없이)
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw YAML 구조체 (serde 역직렬화용)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(default = "default_version")]
    version: u32,
    models: BTreeMap<String, RawModel>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    table_name: Option<String>,
    /// 선언 순서 유지 (serde_json preserve_order)
    fields: Map<String, Value>,
    key: Vec<RawKeyPart>,
    #[serde(default)]
    clustering_order: Map<String, Value>,
    #[serde(default)]
    indexes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKeyPart {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    #[serde(rename = "type")]
    column_type: Option<String>,
    default: Option<Value>,
    rule: Option<RawRule>,
    r#virtual: Option<RawVirtual>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    validator: String,
    message: Option<String>,
    #[serde(default)]
    ignore_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVirtual {
    get: Option<String>,
}
