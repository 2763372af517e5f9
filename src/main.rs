mod config;
mod db;
mod detector;
mod error;
mod fetcher;
mod logging;
mod notifier;
mod state;
mod types;
mod watcher;

use tracing::{error, info};

use crate::config::Config;
use crate::db::CsvLedger;
use crate::error::Result;
use crate::fetcher::HttpMarketSource;
use crate::notifier::mail::SmtpRelay;
use crate::types::Termination;
use crate::watcher::{MarketWatcher, WatchSettings};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let log_guard = match logging::init_logging(&cfg.log_level, &cfg.log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", cfg.log_file);
            std::process::exit(1);
        }
    };

    let code = match run(cfg).await {
        Ok(termination) if !termination.is_fatal() => 0,
        Ok(_) => 1,
        Err(e) => {
            error!("Fatal error: {e}");
            1
        }
    };

    // exit() skips destructors; flush the file writer first
    drop(log_guard);
    std::process::exit(code);
}

async fn run(cfg: Config) -> Result<Termination> {
    info!(
        api = %cfg.api_url,
        ledger = %cfg.markets_csv,
        poll_interval_secs = cfg.poll_interval_secs,
        debug_mode = cfg.debug_mode,
        "predictit-watch starting"
    );

    let source = HttpMarketSource::new(cfg.api_url.clone())?;
    let relay = SmtpRelay::from_config(&cfg)?;
    let ledger = CsvLedger::new(&cfg.markets_csv);

    let mut watcher = MarketWatcher::new(source, relay, ledger, WatchSettings::from_config(&cfg))?;
    let termination = watcher.run().await;
    info!(known = watcher.known().len(), "Watcher stopped: {termination}");
    Ok(termination)
}
