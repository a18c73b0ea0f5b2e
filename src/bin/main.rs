//! rowgraph CLI - inspect and query a database as a nested graph
//!
//! Usage:
//!   rowgraph schema [--root <table>]
//!   rowgraph query '<selection>' [--explain]
//!
//! Examples:
//!   rowgraph schema
//!   rowgraph --config ./rowgraph.toml query '{ customers { id address { street } } }'
//!   rowgraph query '{ addresses { id customers_on_address { id } } }' --explain

use clap::{Parser, Subcommand};
use rowgraph::config::{Driver, Settings};
use rowgraph::front::Front;
use rowgraph::live::LiveQueries;
use rowgraph::metadata::{IntrospectionProvider, SqliteProvider};
use rowgraph::query::{RowSource, Selection, SqliteSource};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowgraph")]
#[command(about = "rowgraph - Query a relational database as nested data graphs")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ROWGRAPH_CONFIG, ./rowgraph.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the type graph of the introspected database
    Schema {
        /// Only print types reachable from this table
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Run one nested selection and print the JSON response
    Query {
        /// Selection text, e.g. '{ customers { id } }'
        selection: String,

        /// Print the generated SQL instead of running it
        #[arg(short, long)]
        explain: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let front = match connect(&settings).await {
        Ok(front) => front,
        Err(e) => {
            eprintln!("Startup error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Schema { root } => cmd_schema(&front, root).await,
        Commands::Query { selection, explain } => cmd_query(&front, &selection, explain).await,
    }
}

/// Open the pool, introspect and publish the first snapshot.
async fn connect(settings: &Settings) -> Result<Front, Box<dyn std::error::Error>> {
    let db = &settings.database;
    let url = db.resolved_url()?;
    let pool = db.pool.to_pool_config()?;
    let namespace = db.namespace()?;
    let live = LiveQueries::new(settings.live.to_live_config(&settings.cdc)?);

    let (source, provider): (Arc<dyn RowSource>, Box<dyn IntrospectionProvider>) =
        match db.driver_type()? {
            Driver::Sqlite => {
                let source = SqliteSource::connect(&url, &pool).await?;
                let provider = SqliteProvider::new(source.pool().clone());
                (Arc::new(source), Box::new(provider))
            }
            #[cfg(feature = "postgres")]
            Driver::Postgres => {
                let source = rowgraph::query::PostgresSource::connect(&url, &pool).await?;
                let provider = rowgraph::metadata::PostgresProvider::new(source.pool().clone());
                (Arc::new(source), Box::new(provider))
            }
            #[cfg(not(feature = "postgres"))]
            Driver::Postgres => {
                return Err("postgres support requires the `postgres` feature".into());
            }
        };

    let front = Front::new(source, &namespace, live);
    front.rebuild(provider.as_ref()).await?;
    Ok(front)
}

async fn cmd_schema(front: &Front, root: Option<String>) -> ExitCode {
    let snapshot = front.snapshot().await;
    let graph = snapshot.graph();

    match root {
        None => print!("{}", graph.to_sdl()),
        Some(root) => {
            let reachable = graph.reachable_from(&root);
            if reachable.is_empty() {
                eprintln!("Unknown table: {}", root);
                return ExitCode::FAILURE;
            }
            for name in reachable {
                println!("{}", name);
            }
        }
    }
    ExitCode::SUCCESS
}

async fn cmd_query(front: &Front, text: &str, explain: bool) -> ExitCode {
    let selection = match Selection::parse(text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if explain {
        let snapshot = front.snapshot().await;
        return match snapshot.prepare(&selection) {
            Ok(executable) => {
                for sql in executable.query().explain(snapshot.dialect()) {
                    println!("{};", sql);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Compilation error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let response = front.handle(&selection).await;
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if response.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
