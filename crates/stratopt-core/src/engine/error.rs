use thiserror::Error;

use super::config::{ConfigError, ResponseKind};
use super::solver::SolverError;
use crate::core::expr::ExprError;
use crate::core::models::mass::MassError;
use crate::core::results::reader::ResultError;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single trial. Recovered locally by substituting the sentinel objective.
#[derive(Debug, Error)]
pub enum TrialError {
    #[error("Failed to write model artifact '{path}': {source}")]
    ModelWrite {
        path: String,
        #[source]
        source: BoxedError,
    },

    #[error("Solver failed: {0}")]
    Solver(#[from] SolverError),

    #[error("Result extraction failed: {0}")]
    Results(#[from] ResultError),

    #[error("Result set contains no load cases")]
    NoLoadCases,

    #[error("Load case {load_case} is not present in the result set")]
    MissingLoadCase { load_case: u32 },

    #[error("{kind} result for entity {id} not found")]
    MissingEntity { kind: ResponseKind, id: u32 },

    #[error("Objective expression failed: {0}")]
    Expression(#[from] ExprError),
}

/// Run-level failure, or the cancellation signal that unwinds a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load model '{path}': {source}")]
    ModelLoad {
        path: String,
        #[source]
        source: BoxedError,
    },

    #[error("Failed to compute baseline mass: {0}")]
    Mass(#[from] MassError),

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist run summary: {0}")]
    Summary(#[source] BoxedError),

    #[error("Optimization cancelled")]
    Cancelled,

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
