//! 선언 스키마 파싱 및 IR 생성
//!
//! # 개요
//!
//! 모델은 Rust API(`SchemaDescription`) 또는 YAML 모델 소스로 선언됩니다.
//! 어느 쪽이든 `Schema::compile`을 거쳐 불변 스키마가 됩니다.
//!
//! # 모듈 구조
//!
//! - `types`: 타입 레지스트리 (CQL 타입 이름 → `ColumnType`)
//! - `field`: 필드 정의 (기본값, 검증 규칙, virtual accessor)
//! - `key`: partition / clustering key 모델
//! - `table`: 테이블 정의 (라이브 / 목표)
//! - `ir`: 컴파일된 스키마와 스키마 집합
//! - `expr`: CEL 표현식 래퍼
//! - `parser`: YAML 파싱 로직

mod expr;
mod field;
mod ir;
mod key;
mod parser;
mod table;
mod types;

pub use expr::CelExpr;
pub use field::{
    is_identifier, DefaultValue, FieldDefinition, FieldSpec, ResolvedDefault, RuleMessage,
    ValidationRule, VirtualAccessor,
};
pub use ir::{Schema, SchemaDescription, SchemaSet};
pub use key::{KeyModel, KeyRole, SortOrder};
pub use parser::SchemaParser;
pub use table::TableDefinition;
pub use types::{ColumnType, TypeRegistry};
