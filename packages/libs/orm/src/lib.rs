//! clb-orm: 와이드 컬럼 스토어용 ORM
//!
//! 스키마 집합을 스토어에 bind하여 테이블을 조정하고,
//! 모델 핸들을 통해 인스턴스를 조회 / 저장 / 삭제합니다.
//!
//! # 모듈 구조
//!
//! - `driver`: 스토어 드라이버 경계 (`DriverGateway`)
//! - `config`: bind 설정 (`BindOptions`)
//! - `context`: bind 단계와 컨텍스트 객체
//! - `model`: 모델 핸들 (find / save / delete / update)

pub mod config;
pub mod context;
pub mod driver;
pub mod model;

pub use config::{BindOptions, Consistency};
pub use context::{bind, OrmContext};
pub use driver::{DriverGateway, ExecOptions, Row};
pub use model::{Model, QueryResult};

pub use clb_core::{Error, Instance, Result};
pub use clb_cql::{QueryOptions, SaveOptions};
