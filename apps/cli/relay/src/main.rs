use relay::args::Args;
use relay::console::Console;
use relay::error::RelayError;
use relay::logger::initialize as LoggerInitialize;

use relay_core::supervisor;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio::io::{BufReader, stdin, stdout};
use tokio::runtime::Builder;

/// Blocking stdin reads never finish on their own; don't wait for them on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    // Optional; real environment variables win.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let runtime = match Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(run(args));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), RelayError> {
    let log_dir = args.log_dir();
    create_dir_all(&log_dir).map_err(|e| RelayError::Relay {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::caller(),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Relay starting");
    info!("Log directory: {}", log_dir.display());

    let config = args.server_config()?;
    info!(
        "Token: {} ({} chars), auth attempt limit: {}",
        config.token,
        config.token.len(),
        config.auth_attempt_limit
    );

    let handle = supervisor::start(config).await?;
    let console = Console::new(handle.clone(), BufReader::new(stdin()), stdout());

    tokio::select! {
        result = console.run() => {
            result?;
            info!("Console finished, stopping server");
        }
        result = handle.join() => {
            // The accept loop only stops on its own when a rebind failed.
            result?;
            return Ok(());
        }
        interrupted = tokio::signal::ctrl_c() => {
            if let Err(e) = interrupted {
                error!("Failed to listen for ctrl-c: {e}");
            }
            info!("Interrupted, stopping server");
        }
    }

    handle.exit().await;
    handle.join().await?;
    info!("BYE!");
    Ok(())
}
