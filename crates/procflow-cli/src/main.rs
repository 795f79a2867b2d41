//! Procflow CLI - run a batch of shell commands concurrently.
//!
//! Commands come either from a JSON batch file (`--config`) or from the
//! positional arguments. Ctrl-C and the optional `--timeout` both fire one
//! shared cancellation token, which cancels every command still running.

use anyhow::{bail, Result};
use clap::Parser;
use procflow_core::config::AppConfig;
use procflow_core::{platform, BatchConfig, CancellationToken, ProcflowError, ProcessManager};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "procflow")]
#[command(about = "Run shell commands concurrently with shared cancellation")]
struct Args {
    /// JSON batch file to run
    #[arg(short, long, conflicts_with = "commands")]
    config: Option<PathBuf>,

    /// Deadline for the whole batch in seconds (overrides the batch file)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Wait for every command and report each outcome instead of stopping at
    /// the first failure
    #[arg(long)]
    settled: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Commands to run, numbered from 1
    commands: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let batch = load_batch(&args)?;
    let timeout = batch.timeout();
    let manager = batch.to_manager();

    info!(
        "{}: starting {} process(es) on {}",
        AppConfig::APP_NAME,
        manager.len(),
        platform::current_platform()
    );

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling batch");
                token.cancel();
            }
        });
    }
    if let Some(timeout) = timeout {
        info!("Batch deadline: {:?}", timeout);
        let _deadline = token.cancel_after(timeout);
    }

    let failure = if args.settled {
        run_settled(&manager, &token).await
    } else {
        manager.run_all(Some(&token)).await.err()
    };

    match failure {
        None => {
            info!("All processes completed");
            Ok(ExitCode::SUCCESS)
        }
        Some(e) => {
            error!("Batch failed: {}", e);
            Ok(ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1)))
        }
    }
}

/// Build the batch from the arguments. `--timeout` replaces the file's
/// deadline and is validated with the rest of the batch.
fn load_batch(args: &Args) -> Result<BatchConfig> {
    let mut batch = match &args.config {
        Some(path) => BatchConfig::load(path)?,
        None => BatchConfig::from_commands(args.commands.iter().cloned()),
    };
    if args.timeout.is_some() {
        batch.timeout_secs = args.timeout;
    }
    batch.validate()?;

    if batch.processes.is_empty() {
        bail!("nothing to run: pass commands or --config <file>");
    }
    Ok(batch)
}

/// Run every process to the end, print one line per outcome, and return the
/// first failure in batch order.
async fn run_settled(manager: &ProcessManager, token: &CancellationToken) -> Option<ProcflowError> {
    let mut first_failure = None;

    // Outcome lines go to stdout so they can be piped; logs stay on stderr.
    for (id, result) in manager.run_all_settled(Some(token)).await {
        match result {
            Ok(()) => println!("{id}\tok"),
            Err(e) => {
                println!("{id}\tfailed\t{e}");
                first_failure.get_or_insert(e);
            }
        }
    }

    first_failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use procflow_core::config::ProcessConfig;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_positional_commands() {
        let args = Args::try_parse_from(["procflow", "-t", "5", "sleep 1", "true"]).unwrap();
        assert_eq!(args.timeout, Some(5));

        let batch = load_batch(&args).unwrap();
        assert_eq!(batch.processes.len(), 2);
        assert_eq!(batch.processes[1].id, 2);
        assert_eq!(batch.timeout(), Some(std::time::Duration::from_secs(5)));
    }

    #[test]
    fn test_timeout_flag_is_bounded() {
        let too_long = (ProcessConfig::MAX_BATCH_TIMEOUT.as_secs() + 1).to_string();
        let args = Args::try_parse_from(["procflow", "-t", &too_long, "true"]).unwrap();
        assert!(load_batch(&args).is_err());

        let max = ProcessConfig::MAX_BATCH_TIMEOUT.as_secs().to_string();
        let args = Args::try_parse_from(["procflow", "-t", &max, "true"]).unwrap();
        assert!(load_batch(&args).is_ok());
    }

    #[test]
    fn test_config_conflicts_with_commands() {
        assert!(Args::try_parse_from(["procflow", "--config", "b.json", "true"]).is_err());
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let args = Args::try_parse_from(["procflow"]).unwrap();
        assert!(load_batch(&args).is_err());
    }
}
