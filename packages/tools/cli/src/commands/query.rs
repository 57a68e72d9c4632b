//! Query 명령어

use clb_core::schema::SchemaSet;
use clb_core::CqlValue;
use clb_cql::{QueryObject, QueryOptions, SelectBuilder};

use super::find_model;

/// 쿼리 객체를 CQL로 컴파일하여 출력
pub fn compile(
    schemas: &SchemaSet,
    keyspace: Option<&str>,
    model: &str,
    query: &str,
    select: Option<&str>,
    allow_filtering: bool,
) -> anyhow::Result<()> {
    let (cql, params) = render(schemas, keyspace, model, query, select, allow_filtering)?;
    println!("{}", cql);
    println!("{}", params);
    Ok(())
}

/// 컴파일된 CQL과 파라미터(JSON 배열)
fn render(
    schemas: &SchemaSet,
    keyspace: Option<&str>,
    model: &str,
    query: &str,
    select: Option<&str>,
    allow_filtering: bool,
) -> anyhow::Result<(String, serde_json::Value)> {
    let schema = find_model(schemas, model)?;
    let query: serde_json::Value = serde_json::from_str(query)?;
    let query = QueryObject::parse(&query)?;

    let options = QueryOptions {
        raw: false,
        select: select.map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        }),
        allow_filtering,
    };

    let compiled = SelectBuilder::new(schema)
        .keyspace(keyspace)
        .build(&query, &options)?;
    let params = compiled
        .statement
        .params
        .iter()
        .map(CqlValue::to_json)
        .collect();

    Ok((compiled.statement.cql, serde_json::Value::Array(params)))
}
