//! 모델 인스턴스
//!
//! 스키마에 묶인 필드 이름 → 값 맵입니다.
//!
//! - 생성(`construct`): 명시 값 검증 → virtual setter → 미지정 저장 필드의 기본값
//! - 하이드레이션(`hydrate`): 저장된 값 대입, virtual getter는 읽을 때마다 계산
//! - 대입(`set`): 매번 재검증, virtual 필드면 setter 호출
//!
//! 모든 단계는 동기적으로 끝나며 네트워크 호출 전에 완료됩니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::{ResolvedDefault, Schema};
use crate::value::CqlValue;

static NULL: Value = Value::Null;

/// 모델 인스턴스
#[derive(Debug, Clone)]
pub struct Instance {
    schema: Arc<Schema>,

    /// 저장 필드의 현재 값
    values: HashMap<String, Value>,

    /// 스토어 기본값을 기다리는 필드 (필드 이름 → 스토어 함수 표현식)
    deferred: BTreeMap<String, String>,
}

impl Instance {
    /// 인스턴스 생성
    ///
    /// 명시 값은 즉시 검증되며, 첫 실패에서 생성이 중단됩니다 (부분 인스턴스는 반환하지 않음).
    pub fn construct(schema: Arc<Schema>, initial: Map<String, Value>) -> Result<Self> {
        for name in initial.keys() {
            if schema.field(name).is_none() {
                return Err(Error::UnknownField {
                    field: name.clone(),
                });
            }
        }

        let mut instance = Self {
            schema: Arc::clone(&schema),
            values: HashMap::new(),
            deferred: BTreeMap::new(),
        };

        // 1. 명시된 저장 필드
        for field in schema.persisted_fields() {
            if let Some(value) = initial.get(&field.name) {
                field.validate(value, false)?;
                instance.values.insert(field.name.clone(), value.clone());
            }
        }

        // 2. 명시된 virtual 필드 (setter가 형제 필드를 채울 수 있음)
        for field in schema.virtual_fields() {
            if let Some(value) = initial.get(&field.name) {
                field.validate(value, false)?;
                field.virtual_set(&mut instance, value.clone())?;
            }
        }

        // 3. 미지정 저장 필드의 기본값 (선언 순서)
        for field in schema.persisted_fields() {
            if instance.values.contains_key(&field.name) {
                continue;
            }
            match field.resolve_default(&instance) {
                Some(ResolvedDefault::Value(value)) => {
                    field.validate(&value, true)?;
                    instance.values.insert(field.name.clone(), value);
                }
                Some(ResolvedDefault::DeferredToStore(expr)) => {
                    instance.deferred.insert(field.name.clone(), expr);
                }
                None => {}
            }
        }

        Ok(instance)
    }

    /// 스토어 결과로 인스턴스 복원
    ///
    /// 스토어에서 읽은 값은 검증하지 않으며 기본값도 적용하지 않습니다.
    pub fn hydrate(schema: Arc<Schema>, row: Map<String, Value>) -> Self {
        let mut values = HashMap::new();
        for (name, value) in row {
            match schema.field(&name) {
                Some(field) if field.is_persisted() => {
                    values.insert(name, value);
                }
                _ => tracing::debug!(
                    "ignoring column {} not declared on {}",
                    name,
                    schema.model_name()
                ),
            }
        }

        Self {
            schema,
            values,
            deferred: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// 필드 값 읽기
    ///
    /// virtual 필드는 읽을 때마다 getter로 계산합니다 (캐시하지 않음).
    pub fn get(&self, name: &str) -> Result<Value> {
        let field = self.schema.field(name).ok_or_else(|| Error::UnknownField {
            field: name.to_string(),
        })?;

        if field.is_virtual() {
            return Ok(field.virtual_get(self));
        }
        Ok(self.value(name).clone())
    }

    /// 저장 필드 값 참조 (미설정이면 null)
    ///
    /// getter와 계산 기본값에서 형제 필드를 읽을 때 사용합니다.
    pub fn value(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    /// 필드 값 대입
    ///
    /// 매 대입마다 검증하며, virtual 필드는 setter를 호출합니다.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let field = schema.field(name).ok_or_else(|| Error::UnknownField {
            field: name.to_string(),
        })?;

        field.validate(&value, false)?;

        if field.is_virtual() {
            return field.virtual_set(self, value);
        }

        self.deferred.remove(name);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// 저장 필드 값이 설정되었는지 (null 제외)
    pub fn is_set(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_null())
    }

    /// 스토어 기본값을 기다리는 필드인지
    pub fn is_deferred(&self, name: &str) -> bool {
        self.deferred.contains_key(name)
    }

    /// 스토어 기본값을 기다리는 필드 목록 (필드 이름, 스토어 함수)
    pub fn deferred_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.deferred.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 설정된 저장 필드를 저장 표현으로 직렬화 (선언 순서)
    pub fn to_row(&self) -> Result<Vec<(String, CqlValue)>> {
        let mut row = Vec::new();
        for field in self.schema.persisted_fields() {
            if let Some(value) = self.values.get(&field.name) {
                row.push((field.name.clone(), field.coerce(value)?));
            }
        }
        Ok(row)
    }

    /// 키 컴포넌트 값 (primary key 순서)
    ///
    /// 미설정이거나 스토어 기본값 대기 중인 컴포넌트가 있으면 `IncompleteKey`입니다.
    pub fn key_values(&self) -> Result<Vec<(String, CqlValue)>> {
        let mut keys = Vec::new();
        for name in self.schema.key().primary_key_fields() {
            if !self.is_set(name) {
                return Err(Error::IncompleteKey {
                    field: name.clone(),
                });
            }
            let field = self.schema.field(name).ok_or_else(|| Error::UnknownField {
                field: name.clone(),
            })?;
            keys.push((name.clone(), field.coerce(self.value(name))?));
        }
        Ok(keys)
    }

    /// CEL 평가용 변수 (모든 저장 필드, 미설정은 null)
    pub fn variables(&self) -> Vec<(String, Value)> {
        self.schema
            .persisted_fields()
            .map(|f| (f.name.clone(), self.value(&f.name).clone()))
            .collect()
    }

    /// JSON 표현 (저장 필드 + getter가 있는 virtual 필드)
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for field in self.schema.fields() {
            if field.is_virtual() {
                let has_getter = field.accessor.as_ref().is_some_and(|a| a.get.is_some());
                if has_getter {
                    obj.insert(field.name.clone(), field.virtual_get(self));
                }
            } else if let Some(value) = self.values.get(&field.name) {
                obj.insert(field.name.clone(), value.clone());
            }
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, SchemaDescription, ValidationRule};
    use serde_json::json;

    fn person_schema() -> Arc<Schema> {
        let desc = SchemaDescription::new("person")
            .field("id", FieldSpec::typed("uuid"))
            .field("name", FieldSpec::typed("text").default_value(json!("no name")))
            .field("surname", FieldSpec::typed("text"))
            .field(
                "age",
                FieldSpec::typed("int").rule(
                    ValidationRule::new(|v| v.as_i64().map_or(false, |n| n > 0))
                        .with_message_fn(|v| format!("must be > 0, got {}", v)),
                ),
            )
            .field(
                "slug",
                FieldSpec::typed("text").default_fn(|inst| {
                    json!(format!(
                        "{}-{}",
                        inst.value("name").as_str().unwrap_or(""),
                        inst.value("surname").as_str().unwrap_or("")
                    ))
                }),
            )
            .field("created", FieldSpec::typed("timestamp").default_db("toTimestamp(now())"))
            .field(
                "complete_name",
                FieldSpec::virtual_field().getter(|inst| {
                    json!(format!(
                        "{} {}",
                        inst.value("name").as_str().unwrap_or(""),
                        inst.value("surname").as_str().unwrap_or("")
                    ))
                }),
            )
            .field(
                "full_name",
                FieldSpec::virtual_field().setter(|inst, value| {
                    let text = value.as_str().unwrap_or("").to_string();
                    let mut parts = text.splitn(2, ' ');
                    inst.set("name", json!(parts.next().unwrap_or("")))?;
                    inst.set("surname", json!(parts.next().unwrap_or("")))
                }),
            )
            .partition_key(["id"]);
        Arc::new(Schema::compile(desc).unwrap())
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_literal_default_applied() {
        let inst = Instance::construct(person_schema(), Map::new()).unwrap();
        assert_eq!(inst.get("name").unwrap(), json!("no name"));
    }

    #[test]
    fn test_getter_only_virtual_field() {
        let mut inst = Instance::construct(
            person_schema(),
            obj(json!({ "name": "Alex", "surname": "Rubiks" })),
        )
        .unwrap();
        assert_eq!(inst.get("complete_name").unwrap(), json!("Alex Rubiks"));

        // getter만 있는 필드에 대입해도 저장 상태는 변하지 않음
        inst.set("complete_name", json!("Someone Else")).unwrap();
        assert_eq!(inst.get("complete_name").unwrap(), json!("Alex Rubiks"));
        assert!(inst.to_row().unwrap().iter().all(|(k, _)| k != "complete_name"));
    }

    #[test]
    fn test_getter_is_lazy() {
        let mut inst = Instance::construct(
            person_schema(),
            obj(json!({ "name": "Alex", "surname": "Rubiks" })),
        )
        .unwrap();
        inst.set("surname", json!("Cube")).unwrap();
        assert_eq!(inst.get("complete_name").unwrap(), json!("Alex Cube"));
    }

    #[test]
    fn test_setter_only_virtual_field() {
        let inst = Instance::construct(person_schema(), obj(json!({ "full_name": "Ada Lovelace" })))
            .unwrap();
        assert_eq!(inst.get("name").unwrap(), json!("Ada"));
        assert_eq!(inst.get("surname").unwrap(), json!("Lovelace"));
        // setter만 있는 필드는 읽으면 null
        assert_eq!(inst.get("full_name").unwrap(), Value::Null);
    }

    #[test]
    fn test_computed_default_sees_siblings() {
        let inst = Instance::construct(
            person_schema(),
            obj(json!({ "name": "Alex", "surname": "Rubiks" })),
        )
        .unwrap();
        assert_eq!(inst.get("slug").unwrap(), json!("Alex-Rubiks"));
    }

    #[test]
    fn test_database_default_is_deferred() {
        let inst = Instance::construct(person_schema(), Map::new()).unwrap();
        assert!(inst.is_deferred("created"));
        assert_eq!(inst.get("created").unwrap(), Value::Null);
        assert_eq!(
            inst.deferred_fields().collect::<Vec<_>>(),
            vec![("created", "toTimestamp(now())")]
        );
    }

    #[test]
    fn test_explicit_value_overrides_database_default() {
        let mut inst = Instance::construct(person_schema(), Map::new()).unwrap();
        inst.set("created", json!("2024-01-01T00:00:00.000Z")).unwrap();
        assert!(!inst.is_deferred("created"));
    }

    #[test]
    fn test_construct_aborts_on_invalid_value() {
        let err = Instance::construct(person_schema(), obj(json!({ "age": -15 }))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed for 'age': must be > 0, got -15"
        );
    }

    #[test]
    fn test_set_revalidates() {
        let mut inst = Instance::construct(person_schema(), Map::new()).unwrap();
        assert!(inst.set("age", json!(0)).is_err());
        assert!(inst.set("id", json!("not-a-uuid")).is_err());
        assert!(inst.set("age", json!(30)).is_ok());
    }

    #[test]
    fn test_unknown_field() {
        let err = Instance::construct(person_schema(), obj(json!({ "nope": 1 }))).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));

        let inst = Instance::construct(person_schema(), Map::new()).unwrap();
        assert!(matches!(inst.get("nope"), Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_key_values_incomplete() {
        let inst = Instance::construct(person_schema(), Map::new()).unwrap();
        let err = inst.key_values().unwrap_err();
        assert!(matches!(err, Error::IncompleteKey { ref field } if field == "id"));
    }

    #[test]
    fn test_database_default_skips_validation() {
        let schema = Arc::new(
            Schema::compile(
                SchemaDescription::new("audit")
                    .field("id", FieldSpec::typed("uuid"))
                    .field(
                        "stamp",
                        FieldSpec::typed("timestamp")
                            .default_db("toTimestamp(now())")
                            .rule(ValidationRule::new(|_| false)),
                    )
                    .partition_key(["id"]),
            )
            .unwrap(),
        );

        let inst = Instance::construct(Arc::clone(&schema), Map::new()).unwrap();
        assert!(inst.is_deferred("stamp"));
        assert_eq!(inst.get("stamp").unwrap(), Value::Null);

        // 명시된 값에는 규칙이 적용됨
        let err = Instance::construct(schema, obj(json!({ "stamp": 1_700_000_000_000i64 })))
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { ref field, .. } if field == "stamp"));
    }

    #[test]
    fn test_hydrate_ignores_unknown_columns() {
        let inst = Instance::hydrate(
            person_schema(),
            obj(json!({ "name": "Alex", "surname": "Rubiks", "legacy": 1 })),
        );
        assert_eq!(inst.get("complete_name").unwrap(), json!("Alex Rubiks"));
        assert!(inst.to_json().get("legacy").is_none());
    }
}
