//! replica-router CLI
//!
//! Validates router configuration files and dry-runs routing decisions
//! against them without touching a real database.
//!
//! ```text
//! replica-router check --config router.toml
//! replica-router simulate --config router.toml --ops insert,select,select --fail r1
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use replica_router::config::{load_config, ConnectionConfig, Role, RouterConfig};
use replica_router::observability::logging;
use replica_router::{BoxError, Connection, EngineBuilder, RouteError, RoutingEngine};

#[derive(Parser)]
#[command(name = "replica-router")]
#[command(about = "Primary/replica routing: config checks and dry runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the resolved settings
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Route a sequence of named operations against simulated connections
    Simulate {
        #[arg(short, long)]
        config: PathBuf,

        /// Comma-separated operation names, e.g. insert,select
        #[arg(short, long, value_delimiter = ',', default_value = "select")]
        ops: Vec<String>,

        /// Connections that refuse every operation
        #[arg(short, long, value_delimiter = ',')]
        fail: Vec<String>,
    },
}

/// Simulated connection: answers with its own name, or refuses.
#[derive(Debug)]
struct DryRun {
    name: String,
    down: bool,
}

impl Connection for DryRun {}

#[derive(Serialize)]
struct ConfigSummary<'a> {
    name: &'a str,
    sticky: bool,
    primary_ttl_ms: u64,
    blacklist_duration_ms: u64,
    primary_strategy: &'a str,
    replica_strategy: &'a str,
    primaries: Vec<&'a str>,
    replicas: Vec<&'a str>,
}

#[derive(Serialize)]
struct StepOutcome {
    operation: String,
    connection: Option<String>,
    error: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            init_logging(&config);
            println!("{}", serde_json::to_string_pretty(&summarize(&config))?);
        }
        Commands::Simulate { config, ops, fail } => {
            let config = load_config(&config)?;
            init_logging(&config);

            let failing: HashSet<String> = fail.into_iter().collect();
            let connector = |c: &ConnectionConfig| -> Result<DryRun, BoxError> {
                Ok(DryRun {
                    name: c.name.clone(),
                    down: failing.contains(&c.name),
                })
            };
            let engine = EngineBuilder::new(config).connect(&connector)?;

            let steps: Vec<StepOutcome> = ops.iter().map(|op| simulate_step(&engine, op)).collect();
            let report = serde_json::json!({
                "steps": steps,
                "status": engine.status(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_logging(config: &RouterConfig) {
    if let Err(e) = logging::init(&config.observability) {
        eprintln!("Logging already initialized: {}", e);
    }
}

fn summarize(config: &RouterConfig) -> ConfigSummary<'_> {
    let names = |role| config.connections_for(role).map(|c| c.name.as_str()).collect();
    ConfigSummary {
        name: &config.name,
        sticky: config.sticky,
        primary_ttl_ms: config.primary_ttl_ms,
        blacklist_duration_ms: config.blacklist_duration_ms,
        primary_strategy: &config.primary_strategy,
        replica_strategy: &config.replica_strategy,
        primaries: names(Role::Primary),
        replicas: names(Role::Replica),
    }
}

fn simulate_step(engine: &RoutingEngine<DryRun>, operation: &str) -> StepOutcome {
    let result: Result<String, RouteError> = engine.dispatch(operation, |conn: &DryRun| {
        if conn.down {
            Err(format!("connection refused by {}", conn.name).into())
        } else {
            Ok(conn.name.clone())
        }
    });

    match result {
        Ok(connection) => StepOutcome {
            operation: operation.to_string(),
            connection: Some(connection),
            error: None,
        },
        Err(e) => StepOutcome {
            operation: operation.to_string(),
            connection: None,
            error: Some(e.to_string()),
        },
    }
}
