//! Columba CLI (`clb`)
//!
//! 클러스터에 접속하지 않고 스키마 YAML로부터 DDL, 조정 계획, 컴파일된 쿼리를 확인하는 도구입니다.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "clb")]
#[command(author, version, about = "Columba CLI - offline schema and query inspection", long_about = None)]
struct Cli {
    /// Schema YAML files
    #[arg(long = "schema", short = 's', global = true)]
    schemas: Vec<PathBuf>,

    /// Keyspace used to qualify table names
    #[arg(long, global = true, env = "CLB_KEYSPACE")]
    keyspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ─────────────────────────────────────────────────────────────────────────
    // Schema
    // ─────────────────────────────────────────────────────────────────────────
    /// Print CREATE statements for every model
    Ddl,

    /// Compare a model against a live table definition (JSON) and print the plan
    Plan {
        #[arg(long)]
        model: String,

        /// Live table definition as JSON; omit when the table does not exist
        #[arg(long)]
        live: Option<PathBuf>,

        /// Drop and recreate on incompatible differences
        #[arg(long)]
        destructive: bool,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Query
    // ─────────────────────────────────────────────────────────────────────────
    /// Compile a JSON query object into CQL
    Query {
        #[arg(long)]
        model: String,

        /// Query object, e.g. '{"id": "...", "$limit": 10}'
        #[arg(long)]
        query: String,

        /// Comma-separated projection
        #[arg(long)]
        select: Option<String>,

        #[arg(long)]
        allow_filtering: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clb_cql=info,clb_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // 스키마 로드
    let schemas = commands::load_schemas(&cli.schemas)?;
    let keyspace = cli.keyspace.as_deref();

    match cli.command {
        Commands::Ddl => commands::schema::ddl(&schemas, keyspace),
        Commands::Plan {
            model,
            live,
            destructive,
        } => commands::schema::plan(&schemas, keyspace, &model, live.as_deref(), destructive),
        Commands::Query {
            model,
            query,
            select,
            allow_filtering,
        } => commands::query::compile(
            &schemas,
            keyspace,
            &model,
            &query,
            select.as_deref(),
            allow_filtering,
        ),
    }
}
