//! Schema 관련 명령어

use std::path::Path;

use anyhow::Context;
use clb_core::schema::{SchemaSet, TableDefinition};
use clb_core::Error;
use clb_cql::{DdlGenerator, SchemaCompiler, TableState};

use super::find_model;

/// 모든 모델의 CREATE 문 출력
pub fn ddl(schemas: &SchemaSet, keyspace: Option<&str>) -> anyhow::Result<()> {
    for (_, schema) in schemas.iter() {
        for statement in DdlGenerator::generate(keyspace, &schema.table_definition()) {
            println!("{};", statement);
        }
    }
    Ok(())
}

/// 라이브 정의와 비교한 조정 계획 출력
pub fn plan(
    schemas: &SchemaSet,
    keyspace: Option<&str>,
    model: &str,
    live: Option<&Path>,
    destructive: bool,
) -> anyhow::Result<()> {
    let schema = find_model(schemas, model)?;
    let live = live.map(read_live).transpose()?;

    let compiler = SchemaCompiler::new(keyspace.map(str::to_string)).destructive_recreate(destructive);
    let plan = match compiler.plan(schema, live.as_ref()) {
        Ok(plan) => plan,
        Err(Error::SchemaMismatch { table, issues }) => {
            println!("Table {} is {:?} from model {}:", table, TableState::Diverged, model);
            for issue in &issues {
                println!("  - {}", issue);
            }
            anyhow::bail!("schema mismatch; rerun with --destructive to drop and recreate");
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Plan for {}: {:?} ({:?} -> {:?})",
        plan.table,
        plan.action,
        plan.initial_state,
        plan.action.resulting_state()
    );
    for difference in &plan.differences {
        println!("  - {}", difference);
    }
    for statement in &plan.statements {
        println!("{};", statement);
    }
    Ok(())
}

fn read_live(path: &Path) -> anyhow::Result<TableDefinition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("invalid table definition in {}", path.display()))
}
