mod app;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use watch_core::SystemClock;
use watch_engine::{ReqwestFetcher, SqliteDedupStore};
use watch_logging::{watch_info, LogDestination};

use crate::config::WatchConfig;

#[derive(Parser)]
#[command(name = "watch", about = "Watch document indexes and send notifications for new events")]
struct Cli {
    /// Path of the RON configuration file
    #[arg(short, long, default_value = "watch.ron")]
    config: PathBuf,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every configured task until interrupted
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// List the records already reported for a task
    History {
        /// Task id as given in the configuration
        task: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = WatchConfig::load(&cli.config)?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match config.log_file.as_deref() {
        Some(path) => watch_logging::initialize(LogDestination::Both(path), level),
        None => watch_logging::initialize(LogDestination::Terminal, level),
    }

    let store = Arc::new(
        SqliteDedupStore::open(&config.database)
            .with_context(|| format!("opening store {}", config.database.display()))?,
    );

    match cli.command {
        Commands::Run { once } => {
            let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
            let mut runner = app::build_runner(&config, fetcher, store, Arc::new(SystemClock))?;
            runner.run_until(once.then_some(1), shutdown_signal()).await;
            watch_info!("Stopped");
        }
        Commands::History { task } => {
            let entries = store
                .history(&task)
                .with_context(|| format!("reading history of '{task}'"))?;
            if entries.is_empty() {
                println!("No records reported for '{task}' yet.");
            }
            for line in app::format_history(&entries) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the loop only ends with the process.
        std::future::pending::<()>().await;
    }
}
