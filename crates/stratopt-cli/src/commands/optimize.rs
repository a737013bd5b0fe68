use crate::cli::OptimizeArgs;
use crate::config::PartialOptimizationConfig;
use crate::error::{CliError, Result};
use crate::output::FileSummarySink;
use crate::ui::{CliProgressHandler, UiEvent};
use stratopt::core::io::bdf::BdfFile;
use stratopt::engine::config::OptimizationConfig;
use stratopt::engine::error::EngineError;
use stratopt::workflows::optimize::{self, RunServices};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: OptimizeArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let partial_config = PartialOptimizationConfig::load(&args)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;
    validate_inputs(&config)?;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.work_dir.clone());
    let services =
        RunServices::standard(&config).with_sink(Box::new(FileSummarySink::new(&output_dir)));

    let mut progress_handler = CliProgressHandler::new(ui_sender);
    info!("Invoking the core optimization workflow...");
    let handle =
        match optimize::spawn::<BdfFile>(config, services, progress_handler.get_callback()) {
            Ok(handle) => handle,
            Err(e) => {
                progress_handler.flush().await;
                return Err(e.into());
            }
        };
    let cancel = handle.cancellation_token();

    let mut join = tokio::task::spawn_blocking(move || handle.join());
    let joined = loop {
        tokio::select! {
            joined = &mut join => break joined,
            signal = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                warn!("Stop requested; finishing the current trial...");
                cancel.cancel();
            }
        }
    };
    // The worker has exited and dropped its callback; let the queued events reach the UI.
    progress_handler.flush().await;
    let outcome = joined
        .map_err(|e| CliError::Other(anyhow::anyhow!("Optimization task failed: {}", e)))?;

    match outcome {
        Ok(summary) => {
            match summary.best.as_ref() {
                Some(best) => println!(
                    "✓ Best result {:.5} at iteration {} ({}) after {} trial(s)",
                    best.raw, best.iteration, best.artifact, summary.total_iterations
                ),
                None => println!(
                    "Warning: none of the {} trial(s) produced a usable result",
                    summary.total_iterations
                ),
            }
            println!("Results written to: {}", output_dir.display());
            Ok(())
        }
        Err(EngineError::Cancelled) => Err(CliError::Stopped),
        Err(e) => Err(e.into()),
    }
}

/// Rejects runs whose model or solver is missing before any worker is started.
fn validate_inputs(config: &OptimizationConfig) -> Result<()> {
    if !config.model_path.is_file() {
        return Err(CliError::Argument(format!(
            "BDF file not found: {}",
            config.model_path.display()
        )));
    }
    if !config.solver.executable.exists() {
        return Err(CliError::Argument(format!(
            "Solver executable not found: {}",
            config.solver.executable.display()
        )));
    }
    Ok(())
}
