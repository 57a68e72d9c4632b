//! DDL 생성기
//!
//! 테이블 정의로부터 CREATE / ALTER / DROP 문을 생성합니다.

use std::collections::BTreeMap;

use clb_core::schema::TableDefinition;

use crate::statement::{qualified_table, quote_ident, Statement};

pub struct DdlGenerator;

impl DdlGenerator {
    /// 테이블 생성 + 인덱스 생성 문장들
    pub fn generate(keyspace: Option<&str>, table: &TableDefinition) -> Vec<Statement> {
        let mut statements = vec![Self::create_table(keyspace, table)];
        for column in &table.indexes {
            statements.push(Self::create_index(keyspace, &table.name, column));
        }
        statements
    }

    /// CREATE TABLE
    ///
    /// 컬럼은 partition key, clustering key, 나머지(이름순) 순서로 나열됩니다.
    pub fn create_table(keyspace: Option<&str>, table: &TableDefinition) -> Statement {
        let mut ordered: Vec<&String> = table
            .partition_key
            .iter()
            .chain(table.clustering_key.iter())
            .collect();
        ordered.extend(table.columns.keys().filter(|c| !table.is_key(c)));

        let mut parts: Vec<String> = ordered
            .into_iter()
            .filter_map(|name| {
                table
                    .columns
                    .get(name)
                    .map(|t| format!("{} {}", quote_ident(name), t))
            })
            .collect();

        let partition = table
            .partition_key
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut primary_key = format!("({})", partition);
        for column in &table.clustering_key {
            primary_key.push_str(", ");
            primary_key.push_str(&quote_ident(column));
        }
        parts.push(format!("PRIMARY KEY ({})", primary_key));

        let mut cql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            qualified_table(keyspace, &table.name),
            parts.join(", ")
        );

        if !table.clustering_key.is_empty() {
            let order = table
                .clustering_key
                .iter()
                .map(|c| {
                    let direction = table.clustering_order.get(c).copied().unwrap_or_default();
                    format!("{} {}", quote_ident(c), direction.as_cql())
                })
                .collect::<Vec<_>>()
                .join(", ");
            cql.push_str(&format!(" WITH CLUSTERING ORDER BY ({})", order));
        }

        Statement::new(cql)
    }

    /// CREATE INDEX (`<table>_<column>_idx`)
    pub fn create_index(keyspace: Option<&str>, table: &str, column: &str) -> Statement {
        Statement::new(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&Self::index_name(table, column)),
            qualified_table(keyspace, table),
            quote_ident(column)
        ))
    }

    pub fn index_name(table: &str, column: &str) -> String {
        format!("{}_{}_idx", table, column)
    }

    /// ALTER TABLE ... ADD
    pub fn add_column(keyspace: Option<&str>, table: &str, column: &str, cql_type: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD {} {}",
            qualified_table(keyspace, table),
            quote_ident(column),
            cql_type
        ))
    }

    /// DROP TABLE
    pub fn drop_table(keyspace: Option<&str>, table: &str) -> Statement {
        Statement::new(format!(
            "DROP TABLE IF EXISTS {}",
            qualified_table(keyspace, table)
        ))
    }

    /// CREATE KEYSPACE (복제 설정은 문자열 맵)
    pub fn create_keyspace(keyspace: &str, replication: &BTreeMap<String, String>) -> Statement {
        let options = replication
            .iter()
            .map(|(k, v)| format!("'{}': '{}'", k.replace('\'', "''"), v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        Statement::new(format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{{}}}",
            quote_ident(keyspace),
            options
        ))
    }
}
