//! 공통 에러 타입
//!
//! Columba 전체(core, cql, orm)에서 사용되는 에러 타입을 정의합니다.
//! 검증/쿼리 형태 에러는 네트워크 호출 전에 동기적으로 반환되고,
//! 스토어 에러는 그대로 전달됩니다. 어떤 에러도 내부에서 재시도하지 않습니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Columba 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Schema Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("unknown type: {type_name}")]
    UnknownType { type_name: String },

    #[error("invalid field spec for '{field}': {message}")]
    InvalidFieldSpec { field: String, message: String },

    #[error("invalid key spec: {message}")]
    InvalidKeySpec { message: String },

    #[error("schema parse error: {message}")]
    SchemaParse { message: String },

    #[error("duplicate model name: {name}")]
    DuplicateModel { name: String },

    #[error("unknown model: {name}")]
    UnknownModel { name: String },

    #[error("schema mismatch on table '{table}': {}", issues.join("; "))]
    SchemaMismatch { table: String, issues: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────────
    // Value Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("validation failed for '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    #[error("unknown field: {field}")]
    UnknownField { field: String },

    #[error("incomplete key: key field '{field}' is not set")]
    IncompleteKey { field: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Query Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("invalid query shape: {message}")]
    InvalidQueryShape { message: String },

    #[error("invalid order by: {message}")]
    InvalidOrderBy { message: String },

    #[error("invalid limit: {message}")]
    InvalidLimit { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Store / Config Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("store error: {message}")]
    Store { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 검증 실패 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 쿼리 형태 에러 생성 헬퍼
    pub fn query_shape(message: impl Into<String>) -> Self {
        Error::InvalidQueryShape {
            message: message.into(),
        }
    }

    /// 스토어 에러 생성 헬퍼 (Driver Gateway 구현체용)
    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
        }
    }

    /// 호출자 실수(검증/형태 에러)인지 여부
    ///
    /// 이 에러들은 네트워크 호출 전에 발생하며 재시도해도 결과가 같습니다.
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            Error::Store { .. } | Error::SchemaMismatch { .. } | Error::Config { .. }
        )
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownType { .. } => "UNKNOWN_TYPE",
            Error::InvalidFieldSpec { .. } => "INVALID_FIELD_SPEC",
            Error::InvalidKeySpec { .. } => "INVALID_KEY_SPEC",
            Error::SchemaParse { .. } => "SCHEMA_PARSE_ERROR",
            Error::DuplicateModel { .. } => "DUPLICATE_MODEL",
            Error::UnknownModel { .. } => "UNKNOWN_MODEL",
            Error::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Error::ValidationFailed { .. } => "VALIDATION_FAILED",
            Error::UnknownField { .. } => "UNKNOWN_FIELD",
            Error::IncompleteKey { .. } => "INCOMPLETE_KEY",
            Error::InvalidQueryShape { .. } => "INVALID_QUERY_SHAPE",
            Error::InvalidOrderBy { .. } => "INVALID_ORDER_BY",
            Error::InvalidLimit { .. } => "INVALID_LIMIT",
            Error::Store { .. } => "STORE_ERROR",
            Error::Config { .. } => "CONFIG_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
