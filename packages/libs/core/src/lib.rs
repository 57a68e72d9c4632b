//! clb-core: Columba 공통 핵심 라이브러리
//!
//! 와이드 컬럼 스토어(CQL)용 ORM의 순수 로직을 제공합니다. 네트워크 I/O는 없습니다.
//!
//! # 모듈 구조
//!
//! - `schema`: 타입 레지스트리, 필드 엔진, 키 모델, 선언 스키마(YAML) 파싱
//! - `instance`: 모델 인스턴스 (생성, 검증, 기본값, virtual 필드)
//! - `value`: 스토어 값 표현 (`CqlValue`)
//! - `id`: 프로세스 내 값 생성 전략 (UUID v4, timeuuid, now)
//! - `error`: 공통 에러 타입

pub mod error;
pub mod id;
pub mod instance;
pub mod schema;
pub mod value;

pub use error::{Error, Result};
pub use instance::Instance;
pub use value::CqlValue;
