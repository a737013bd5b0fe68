use super::config::{Component, MassPenaltyConfig, Mode, OptimizationConfig, ResponseKind, SearchMethod};
use super::context::TunableParameter;
use super::error::BoxedError;
use super::evaluator::EvaluationOutcome;
use super::objective::mass_change;
use super::state::{BestState, TrialRecord};
use crate::core::models::ids::PropertyId;
use crate::core::models::property::TunableKind;
use serde::Serialize;
use std::path::PathBuf;

/// Final state of one design variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub kind: TunableKind,
    pub original: f64,
    /// Multiplier of the best trial; absent when no trial succeeded.
    pub multiplier: Option<f64>,
    pub new_value: Option<f64>,
}

/// Everything a completed run reports for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub model_path: PathBuf,
    pub method: SearchMethod,
    pub mode: Mode,
    pub result_kind: ResponseKind,
    pub component: Component,
    pub entity_ids: Vec<u32>,
    pub load_case: Option<u32>,
    pub objective: String,
    pub selection: String,
    pub mass_penalty: MassPenaltyConfig,
    pub initial_mass: Option<f64>,
    pub best: Option<BestState>,
    pub mass_change_percent: Option<f64>,
    pub total_iterations: usize,
    pub properties: Vec<PropertySummary>,
    pub history: Vec<TrialRecord>,
}

impl RunSummary {
    pub fn new(
        config: &OptimizationConfig,
        parameters: &[TunableParameter],
        initial_mass: Option<f64>,
        outcome: EvaluationOutcome,
    ) -> Self {
        let best_multipliers = outcome.best.as_ref().map(|b| b.multipliers.as_slice());
        let properties = parameters
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let multiplier = best_multipliers.and_then(|m| m.get(i).copied());
                PropertySummary {
                    id: p.id,
                    kind: p.kind,
                    original: p.original,
                    multiplier,
                    new_value: multiplier.map(|m| p.original * m),
                }
            })
            .collect();

        let mass_change_percent = outcome
            .best
            .as_ref()
            .and_then(|b| b.mass)
            .zip(initial_mass)
            .and_then(|(best, initial)| mass_change(best, initial))
            .map(|c| c * 100.0);

        Self {
            model_path: config.model_path.clone(),
            method: config.search.method,
            mode: config.mode,
            result_kind: config.response.kind,
            component: config.response.component,
            entity_ids: config.response.entity_ids.clone(),
            load_case: outcome.load_case,
            objective: config.objective.source().to_string(),
            selection: config.selection.clone(),
            mass_penalty: config.mass_penalty,
            initial_mass,
            best: outcome.best,
            mass_change_percent,
            total_iterations: outcome.history.len(),
            properties,
            history: outcome.history,
        }
    }

    pub fn best_raw(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.raw)
    }

    pub fn best_mass(&self) -> Option<f64> {
        self.best.as_ref().and_then(|b| b.mass)
    }
}

/// Receives the summary of a completed run.
pub trait SummarySink: Send {
    /// # Errors
    ///
    /// Any error turns the completed run into a failed one.
    fn persist(&mut self, summary: &RunSummary) -> Result<(), BoxedError>;
}
