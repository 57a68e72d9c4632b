//! 생성된 CQL 문장

use std::fmt;

use clb_core::CqlValue;

/// CQL 문장과 바인딩할 값들
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cql: String,
    pub params: Vec<CqlValue>,
}

impl Statement {
    /// 파라미터 없는 문장 (DDL 등)
    pub fn new(cql: impl Into<String>) -> Self {
        Self {
            cql: cql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(cql: impl Into<String>, params: Vec<CqlValue>) -> Self {
        Self {
            cql: cql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cql)
    }
}

/// 식별자 인용 (`"name"`, 내부 큰따옴표는 두 번)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// keyspace로 한정된 테이블 이름
pub fn qualified_table(keyspace: Option<&str>, table: &str) -> String {
    match keyspace {
        Some(ks) => format!("{}.{}", quote_ident(ks), quote_ident(table)),
        None => quote_ident(table),
    }
}
