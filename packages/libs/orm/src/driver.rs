//! 스토어 드라이버 경계
//!
//! 네트워크 드라이버, 커넥션 풀, 토폴로지 탐색은 이 트레이트 뒤에 숨겨진 외부 협력자입니다.

use std::collections::BTreeMap;

use async_trait::async_trait;

use clb_core::schema::TableDefinition;
use clb_core::{CqlValue, Result};
use clb_cql::Statement;

use crate::config::Consistency;

/// 결과 행 (컬럼 이름 → 값)
pub type Row = BTreeMap<String, CqlValue>;

/// 문장 실행 옵션
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// 드라이버에 그대로 전달되는 consistency level
    pub consistency: Consistency,
}

/// 스토어 드라이버
///
/// 실패는 `Error::Store`로 보고하며, 재시도하지 않습니다.
#[async_trait]
pub trait DriverGateway: Send + Sync {
    /// 문장 실행 (결과 행 반환, DDL/DML은 빈 목록)
    async fn execute(&self, statement: &Statement, options: &ExecOptions) -> Result<Vec<Row>>;

    /// 라이브 테이블 정의 조회 (없으면 None)
    async fn describe_table(&self, keyspace: &str, table: &str)
        -> Result<Option<TableDefinition>>;
}
