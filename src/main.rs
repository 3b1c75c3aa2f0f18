// Opinion Market Ledger - Main Entry Point
// Reads newline-delimited JSON commands on stdin, writes outcomes on stdout

use std::path::{Path, PathBuf};
use tokio::io::{stdin, stdout, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use opinion_market_ledger::driver::shared;
use opinion_market_ledger::{run_commands, InMemoryBank, MarketConfig, OpinionMarket, SharedMarket};

const DEFAULT_STATE_PATH: &str = "data/state.json";

fn load_market(path: &Path) -> Result<OpinionMarket<InMemoryBank>, String> {
    if path.exists() {
        return OpinionMarket::load_from_file(path);
    }
    let config = MarketConfig::from_env().map_err(|e| format!("Invalid configuration: {}", e))?;
    config.validate().map_err(|e| format!("Invalid configuration: {}", e))?;
    info!(path = %path.display(), "no saved state, starting a fresh market");
    Ok(OpinionMarket::with_config(config, InMemoryBank::new()))
}

fn save_market(market: &SharedMarket, path: &Path) {
    let guard = market.lock().unwrap_or_else(|e| e.into_inner());
    if let Err(e) = guard.save_to_file(path) {
        error!("Failed to save state: {}", e);
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // stdout carries command outcomes, so logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state_path = PathBuf::from(std::env::var("MARKET_STATE_PATH").unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string()));

    let market = match load_market(&state_path) {
        Ok(market) => shared(market),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(state = %state_path.display(), "opinion market ledger ready");

    // Save on Ctrl-C
    let shutdown_market = market.clone();
    let shutdown_path = state_path.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to install CTRL+C handler");
            return;
        }
        info!("shutdown signal received, saving state");
        save_market(&shutdown_market, &shutdown_path);
        std::process::exit(0);
    });

    match run_commands(BufReader::new(stdin()), stdout(), &market).await {
        Ok(summary) => info!(commands = summary.commands, failed = summary.failed, "input exhausted"),
        Err(e) => error!("I/O error while reading commands: {}", e),
    }

    save_market(&market, &state_path);
}
