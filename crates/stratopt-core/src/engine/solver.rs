use super::config::SolverConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use sysinfo::System;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Failed to launch solver '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed waiting for solver process: {0}")]
    Wait(#[source] io::Error),
    #[error("Model path '{0}' has no file name")]
    InvalidModelPath(String),
}

/// Runs the external solver on one model artifact and blocks until it has finished.
pub trait SolverRunner: Send {
    fn run(&mut self, model_path: &Path) -> Result<(), SolverError>;
}

/// Answers whether a process with a given name is currently alive.
pub trait ProcessTable: Send {
    fn is_running(&mut self, name: &str) -> bool;
}

/// [`ProcessTable`] backed by the operating system's process list.
pub struct SystemProcessTable {
    system: System,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn is_running(&mut self, name: &str) -> bool {
        self.system.refresh_processes();
        self.system.processes_by_exact_name(name).next().is_some()
    }
}

/// Launches `<executable> <model file> <flag>` in the model's directory.
///
/// The launched executable may be a short-lived wrapper that hands the work to a worker
/// process under another name. After the owned child exits, the manager therefore polls
/// the process table until no process named `worker_process` remains. Exit codes are not
/// interpreted; success is judged later from the result artifact.
pub struct SolverProcessManager<P: ProcessTable = SystemProcessTable> {
    config: SolverConfig,
    table: P,
}

impl SolverProcessManager<SystemProcessTable> {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_process_table(config, SystemProcessTable::new())
    }
}

impl<P: ProcessTable> SolverProcessManager<P> {
    pub fn with_process_table(config: SolverConfig, table: P) -> Self {
        Self { config, table }
    }

    fn wait_for_worker(&mut self) {
        let Some(name) = self.config.worker_process.as_deref() else {
            return;
        };
        let mut polls = 0usize;
        while self.table.is_running(name) {
            polls += 1;
            thread::sleep(self.config.poll_interval);
        }
        debug!(worker = name, polls, "Solver worker finished");
    }
}

impl<P: ProcessTable> SolverRunner for SolverProcessManager<P> {
    fn run(&mut self, model_path: &Path) -> Result<(), SolverError> {
        let file_name = model_path
            .file_name()
            .ok_or_else(|| SolverError::InvalidModelPath(model_path.display().to_string()))?;
        let work_dir = match model_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        debug!(
            executable = %self.config.executable.display(),
            model = %model_path.display(),
            "Launching solver"
        );
        let mut child = Command::new(&self.config.executable)
            .arg(file_name)
            .arg(&self.config.flag)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                executable: self.config.executable.display().to_string(),
                source,
            })?;

        let status = child.wait().map_err(SolverError::Wait)?;
        debug!(%status, "Solver launcher exited");

        self.wait_for_worker();
        Ok(())
    }
}
