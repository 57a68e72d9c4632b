//! 필드 정의 (Field Engine)
//!
//! 필드의 타입, 기본값, 검증 규칙, virtual accessor를 정의합니다.
//!
//! # 기본값 단계
//!
//! - `Literal`: 즉시 반환
//! - `Computed`: 소유 인스턴스를 인자로 받아 프로세스 내에서 계산
//! - `Database`: 스토어가 쓰기 시점에 계산 (클라이언트는 다시 읽기 전까지 값을 알 수 없음)
//!
//! `Database` 기본값은 클라이언트에서 검증하지 않습니다. 값이 쓰기 왕복 이후에만 존재하기 때문입니다.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::types::{ColumnType, TypeRegistry};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::value::CqlValue;

/// virtual getter / 계산 기본값
pub type ComputeFn = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

/// virtual setter
pub type SetterFn = Arc<dyn Fn(&mut Instance, Value) -> Result<()> + Send + Sync>;

/// 검증 predicate
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// 검증 실패 메시지 생성기
pub type MessageFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// 필드 기본값
#[derive(Clone)]
pub enum DefaultValue {
    /// 리터럴 값
    Literal(Value),

    /// 프로세스 내 계산 (형제 필드 참조 가능)
    Computed(ComputeFn),

    /// 스토어 함수 호출 (예: `now()`, `uuid()`, `toTimestamp(now())`)
    Database(String),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
            DefaultValue::Database(expr) => f.debug_tuple("Database").field(expr).finish(),
        }
    }
}

/// 기본값 해석 결과
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDefault {
    /// 클라이언트에서 결정된 값
    Value(Value),

    /// 스토어가 쓰기 시점에 채울 값 (스토어 함수 표현식)
    DeferredToStore(String),
}

/// 검증 실패 메시지
#[derive(Clone)]
pub enum RuleMessage {
    Static(String),
    Computed(MessageFn),
}

/// 필드 검증 규칙
#[derive(Clone)]
pub struct ValidationRule {
    predicate: PredicateFn,
    message: Option<RuleMessage>,
    ignore_default: bool,
}

impl ValidationRule {
    /// predicate로 규칙 생성
    pub fn new(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            message: None,
            ignore_default: false,
        }
    }

    /// 고정 메시지
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(RuleMessage::Static(message.into()));
        self
    }

    /// 값으로부터 메시지 생성
    pub fn with_message_fn(
        mut self,
        message: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.message = Some(RuleMessage::Computed(Arc::new(message)));
        self
    }

    /// 기본값에서 나온 값은 검증하지 않음
    pub fn ignore_default(mut self, ignore: bool) -> Self {
        self.ignore_default = ignore;
        self
    }

    pub fn ignores_default(&self) -> bool {
        self.ignore_default
    }

    /// 규칙 평가 (실패 시 메시지 반환)
    pub fn check(&self, field: &str, value: &Value) -> Option<String> {
        if (self.predicate)(value) {
            return None;
        }

        Some(match &self.message {
            Some(RuleMessage::Static(msg)) => msg.clone(),
            Some(RuleMessage::Computed(f)) => f(value),
            None => format!("invalid value {} for field {}", value, field),
        })
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("ignore_default", &self.ignore_default)
            .finish_non_exhaustive()
    }
}

/// virtual accessor 쌍 (서로 독립)
#[derive(Clone, Default)]
pub struct VirtualAccessor {
    pub get: Option<ComputeFn>,
    pub set: Option<SetterFn>,
}

impl fmt::Debug for VirtualAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualAccessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// 필드 선언 (스키마 설명의 값 타입)
///
/// `FieldDefinition::define`을 거쳐 검증된 정의가 됩니다.
#[derive(Clone, Default)]
pub struct FieldSpec {
    pub type_name: Option<String>,
    pub default: Option<DefaultValue>,
    pub rule: Option<ValidationRule>,
    pub is_virtual: bool,
    pub accessor: VirtualAccessor,
}

impl FieldSpec {
    /// 저장 필드 선언
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Default::default()
        }
    }

    /// virtual 필드 선언
    pub fn virtual_field() -> Self {
        Self {
            is_virtual: true,
            ..Default::default()
        }
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Literal(value));
        self
    }

    pub fn default_fn(mut self, f: impl Fn(&Instance) -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Computed(Arc::new(f)));
        self
    }

    pub fn default_db(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Database(expr.into()));
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn getter(mut self, f: impl Fn(&Instance) -> Value + Send + Sync + 'static) -> Self {
        self.is_virtual = true;
        self.accessor.get = Some(Arc::new(f));
        self
    }

    pub fn setter(
        mut self,
        f: impl Fn(&mut Instance, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.is_virtual = true;
        self.accessor.set = Some(Arc::new(f));
        self
    }
}

/// 필드 정의
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// 필드(컬럼) 이름
    pub name: String,

    /// 컬럼 타입 (virtual 필드는 선택)
    pub column_type: Option<ColumnType>,

    /// 기본값
    pub default: Option<DefaultValue>,

    /// 검증 규칙
    pub rule: Option<ValidationRule>,

    /// virtual accessor (Some = virtual 필드)
    pub accessor: Option<VirtualAccessor>,
}

impl FieldDefinition {
    /// 필드 선언 검증 및 정의 생성
    pub fn define(name: impl Into<String>, spec: FieldSpec) -> Result<Self> {
        let name = name.into();
        let invalid = |message: String| Error::InvalidFieldSpec {
            field: name.clone(),
            message,
        };

        if !is_identifier(&name) {
            return Err(invalid("field name must match [A-Za-z_][A-Za-z0-9_]*".to_string()));
        }

        if spec.is_virtual {
            if spec.accessor.get.is_none() && spec.accessor.set.is_none() {
                return Err(invalid("virtual field must declare a getter or a setter".to_string()));
            }
            if spec.default.is_some() {
                return Err(invalid("virtual field cannot declare a default".to_string()));
            }

            // virtual 필드의 타입은 검증용 힌트일 뿐
            let column_type = spec
                .type_name
                .as_deref()
                .and_then(|t| TypeRegistry::resolve(t).ok());

            return Ok(Self {
                name,
                column_type,
                default: None,
                rule: spec.rule,
                accessor: Some(spec.accessor),
            });
        }

        let type_name = spec
            .type_name
            .as_deref()
            .ok_or_else(|| invalid("persisted field requires a type".to_string()))?;
        let column_type = TypeRegistry::resolve(type_name).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name,
            column_type: Some(column_type),
            default: spec.default,
            rule: spec.rule,
            accessor: None,
        })
    }

    pub fn is_virtual(&self) -> bool {
        self.accessor.is_some()
    }

    pub fn is_persisted(&self) -> bool {
        self.accessor.is_none()
    }

    /// 기본값 해석
    ///
    /// 계산 기본값은 소유 인스턴스를 받아 실행됩니다.
    pub fn resolve_default(&self, instance: &Instance) -> Option<ResolvedDefault> {
        match self.default.as_ref()? {
            DefaultValue::Literal(v) => Some(ResolvedDefault::Value(v.clone())),
            DefaultValue::Computed(f) => Some(ResolvedDefault::Value(f(instance))),
            DefaultValue::Database(expr) => Some(ResolvedDefault::DeferredToStore(expr.clone())),
        }
    }

    /// 값 검증
    ///
    /// 타입 검사 후 규칙을 적용합니다. `is_default`이고 규칙이 기본값 제외를 요청하면
    /// 규칙은 건너뜁니다. `null`은 규칙 대상이 아닙니다.
    pub fn validate(&self, value: &Value, is_default: bool) -> Result<()> {
        if let Some(column_type) = &self.column_type {
            if let Err(reason) = column_type.coerce(value) {
                return Err(Error::validation(&self.name, reason));
            }
        }

        let Some(rule) = &self.rule else {
            return Ok(());
        };
        if value.is_null() || (is_default && rule.ignores_default()) {
            return Ok(());
        }

        match rule.check(&self.name, value) {
            Some(message) => Err(Error::validation(&self.name, message)),
            None => Ok(()),
        }
    }

    /// 저장 표현으로 변환
    pub fn coerce(&self, value: &Value) -> Result<CqlValue> {
        let column_type = self.column_type.as_ref().ok_or_else(|| Error::UnknownField {
            field: self.name.clone(),
        })?;
        column_type
            .coerce(value)
            .map_err(|reason| Error::validation(&self.name, reason))
    }

    /// virtual getter 호출 (getter가 없으면 null)
    pub fn virtual_get(&self, instance: &Instance) -> Value {
        match self.accessor.as_ref().and_then(|a| a.get.as_ref()) {
            Some(get) => get(instance),
            None => Value::Null,
        }
    }

    /// virtual setter 호출 (setter가 없으면 no-op)
    pub fn virtual_set(&self, instance: &mut Instance, value: Value) -> Result<()> {
        match self.accessor.as_ref().and_then(|a| a.set.clone()) {
            Some(set) => set(instance, value),
            None => {
                tracing::debug!("ignoring write to read-only virtual field {}", self.name);
                Ok(())
            }
        }
    }
}

/// CQL 식별자 문법 (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
