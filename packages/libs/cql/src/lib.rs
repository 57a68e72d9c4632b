//! clb-cql: 동적 CQL 생성 라이브러리
//!
//! 컴파일된 스키마를 기반으로 런타임에 CQL을 생성합니다.
//! 모든 값은 바인딩 파라미터(`?`)로 전달되며, 식별자는 항상 인용됩니다.
//!
//! # 모듈 구조
//!
//! - `params`: 쿼리 객체 / 옵션 파싱
//! - `filter`: WHERE 제약 검증 (partition / clustering 배치 규칙)
//! - `builder`: SELECT / INSERT / UPDATE / DELETE 빌더
//! - `ddl`: DDL(CREATE TABLE 등) 생성기
//! - `reconcile`: 라이브 테이블 정의와의 조정 (Schema Compiler)
//! - `statement`: 생성된 문장 + 파라미터

pub mod builder;
pub mod ddl;
pub mod filter;
pub mod params;
pub mod reconcile;
pub mod statement;

pub use builder::{CompiledQuery, DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use ddl::DdlGenerator;
pub use params::{QueryObject, QueryOptions, SaveOptions, WhereOperator};
pub use reconcile::{PlanAction, SchemaCompiler, SchemaPlan, TableDiff, TableState};
pub use statement::Statement;
