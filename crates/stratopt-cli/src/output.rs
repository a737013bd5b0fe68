use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use stratopt::core::models::ids::PropertyId;
use stratopt::engine::config::{ResponseKind, SearchMethod};
use stratopt::engine::error::BoxedError;
use stratopt::engine::summary::{RunSummary, SummarySink};
use tracing::info;

pub const SUMMARY_FILE: &str = "summary.toml";
pub const BEST_SOLUTION_FILE: &str = "best_solution.csv";
pub const HISTORY_FILE: &str = "history.csv";

/// Writes the summary of a completed run as TOML and CSV files in one directory.
pub struct FileSummarySink {
    output_dir: PathBuf,
}

impl FileSummarySink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl SummarySink for FileSummarySink {
    fn persist(&mut self, summary: &RunSummary) -> Result<(), BoxedError> {
        fs::create_dir_all(&self.output_dir)?;

        let document = toml::to_string(&SummaryDocument::from(summary))?;
        fs::write(self.output_dir.join(SUMMARY_FILE), document)?;
        write_best_solution(&self.output_dir.join(BEST_SOLUTION_FILE), summary)?;
        write_history(&self.output_dir.join(HISTORY_FILE), summary)?;

        info!("Results saved to {}", self.output_dir.display());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SummaryDocument<'a> {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_result: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_iteration: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_artifact: Option<&'a str>,
    method: SearchMethod,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_value: Option<f64>,
    total_iterations: usize,
    result_type: ResponseKind,
    component: &'static str,
    entity_ids: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    load_case: Option<u32>,
    objective_function: &'a str,
    properties_optimized: usize,
    property_selection: &'a str,
    mass_penalty_enabled: bool,
    mass_penalty_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mass_change_percent: Option<f64>,
    properties: Vec<PropertyEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct PropertyEntry {
    id: PropertyId,
    card: &'static str,
    original: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_value: Option<f64>,
}

impl<'a> From<&'a RunSummary> for SummaryDocument<'a> {
    fn from(summary: &'a RunSummary) -> Self {
        let best = summary.best.as_ref();
        Self {
            model: summary.model_path.display().to_string(),
            best_result: best.map(|b| b.raw),
            best_iteration: best.map(|b| b.iteration),
            best_artifact: best.map(|b| b.artifact.as_str()),
            method: summary.method,
            mode: summary.mode.name(),
            target_value: summary.mode.target(),
            total_iterations: summary.total_iterations,
            result_type: summary.result_kind,
            component: summary.component.name(),
            entity_ids: &summary.entity_ids,
            load_case: summary.load_case,
            objective_function: &summary.objective,
            properties_optimized: summary.properties.len(),
            property_selection: &summary.selection,
            mass_penalty_enabled: summary.mass_penalty.enabled,
            mass_penalty_factor: summary.mass_penalty.factor,
            initial_mass: summary.initial_mass,
            best_mass: summary.best_mass(),
            mass_change_percent: summary.mass_change_percent,
            properties: summary
                .properties
                .iter()
                .map(|p| PropertyEntry {
                    id: p.id,
                    card: p.kind.card_name(),
                    original: p.original,
                    multiplier: p.multiplier,
                    new_value: p.new_value,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct BestSolutionRow {
    #[serde(rename = "PID")]
    pid: PropertyId,
    #[serde(rename = "Property_Type")]
    property_type: &'static str,
    #[serde(rename = "Multiplier")]
    multiplier: f64,
    #[serde(rename = "Original_Value")]
    original_value: f64,
    #[serde(rename = "New_Value")]
    new_value: f64,
}

#[derive(Serialize)]
struct HistoryRow {
    #[serde(rename = "Iteration")]
    iteration: usize,
    #[serde(rename = "Result")]
    result: f64,
    #[serde(rename = "Objective")]
    objective: f64,
    #[serde(rename = "Mass")]
    mass: Option<f64>,
    #[serde(rename = "Failed")]
    failed: bool,
    #[serde(rename = "Multipliers")]
    multipliers: String,
}

fn write_best_solution(path: &Path, summary: &RunSummary) -> Result<(), BoxedError> {
    let mut writer = csv::Writer::from_path(path)?;
    let rows = summary.properties.iter().filter_map(|p| {
        Some(BestSolutionRow {
            pid: p.id,
            property_type: p.kind.card_name(),
            multiplier: p.multiplier?,
            original_value: p.original,
            new_value: p.new_value?,
        })
    });
    let mut written = 0;
    for row in rows {
        writer.serialize(row)?;
        written += 1;
    }
    if written == 0 {
        writer.write_record([
            "PID",
            "Property_Type",
            "Multiplier",
            "Original_Value",
            "New_Value",
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_history(path: &Path, summary: &RunSummary) -> Result<(), BoxedError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in &summary.history {
        writer.serialize(HistoryRow {
            iteration: record.iteration,
            result: record.raw,
            objective: record.objective,
            mass: record.mass,
            failed: record.failed,
            multipliers: record
                .multipliers
                .iter()
                .map(|m| format!("{m:.6}"))
                .collect::<Vec<_>>()
                .join(";"),
        })?;
    }
    if summary.history.is_empty() {
        writer.write_record([
            "Iteration",
            "Result",
            "Objective",
            "Mass",
            "Failed",
            "Multipliers",
        ])?;
    }
    writer.flush()?;
    Ok(())
}
