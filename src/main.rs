//! Command-line entry point for the PTO balance engine.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pto_balance_engine::api::{AppState, BalanceResponse, create_router};
use pto_balance_engine::config::ConfigLoader;
use pto_balance_engine::engine::BalanceEngine;
use pto_balance_engine::maintenance::CommandOutcome;
use pto_balance_engine::storage::CsvTableStore;

#[derive(Debug, Parser)]
#[command(name = "pto-balance", version, about = "PTO balance engine")]
struct Cli {
    /// Directory containing policy.yaml.
    #[arg(long, env = "PTO_CONFIG_DIR", default_value = "./config")]
    config_dir: PathBuf,

    /// Directory holding the ledger and cache tables as CSV files.
    #[arg(long, env = "PTO_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Print machine-readable JSON instead of a report.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: SocketAddr,
    },
    /// Remove every cached balance.
    ClearBalancesCache,
    /// List the cached balances.
    InspectBalancesCache,
    /// Print a user's balance for a year.
    Balance {
        /// The employee.
        user_id: String,
        /// The leave year.
        year: i32,
    },
    /// Mark a user's cached balance for a year stale.
    Invalidate {
        /// The employee.
        user_id: String,
        /// The leave year.
        year: i32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let engine = match build_engine(&cli) {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "Failed to start engine");
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve { listen } => serve(engine, listen).await,
        Command::ClearBalancesCache => {
            print_outcome(&engine.maintenance().clear_balances_cache(), cli.json)
        }
        Command::InspectBalancesCache => {
            print_outcome(&engine.maintenance().inspect_balances_cache(), cli.json)
        }
        Command::Balance { user_id, year } => match engine.balance(&user_id, year) {
            Ok(record) => {
                let response = BalanceResponse::from(record);
                if cli.json {
                    print_json(&response);
                } else {
                    println!(
                        "{} {}: total={} available={} used={} pending={}",
                        response.user_id,
                        response.year,
                        response.total_hours,
                        response.available_hours,
                        response.used_hours,
                        response.pending_hours
                    );
                    if let Some(inconsistency) = &response.inconsistency {
                        println!("Warning: {}", inconsistency);
                    }
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                ExitCode::FAILURE
            }
        },
        Command::Invalidate { user_id, year } => match engine.invalidate(&user_id, year) {
            Ok(previous) => {
                println!("Invalidated {} {} (was {:?})", user_id, year, previous);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn build_engine(cli: &Cli) -> pto_balance_engine::error::EngineResult<BalanceEngine> {
    let config = ConfigLoader::load(&cli.config_dir)?;
    let store = CsvTableStore::open(&cli.data_dir)?;
    info!(data_dir = %cli.data_dir.display(), "Opened table store");
    Ok(BalanceEngine::new(Arc::new(store), config))
}

async fn serve(engine: BalanceEngine, listen: SocketAddr) -> ExitCode {
    let router = create_router(AppState::new(engine));
    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(address = %listen, error = %err, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(address = %listen, "Serving PTO balance API");
    match axum::serve(listener, router).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Server error");
            ExitCode::FAILURE
        }
    }
}

fn print_outcome(outcome: &CommandOutcome, json: bool) -> ExitCode {
    if json {
        print_json(outcome);
    } else {
        println!("{}", outcome.report);
    }
    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(err) => eprintln!("Error: failed to encode output: {}", err),
    }
}
