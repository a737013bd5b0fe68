use super::backend::Objective;
use super::context::{RunContext, TunableParameter};
use super::error::{EngineError, TrialError};
use super::extract::ResponseExtractor;
use super::objective::{SENTINEL_OBJECTIVE, apply_mass_penalty, mass_change, transform};
use super::progress::{Progress, TrialProgress};
use super::solver::SolverRunner;
use super::state::{BestState, BestTracker, History, TrialRecord};
use crate::core::io::traits::ModelFile;
use crate::core::models::model::StructuralModel;
use crate::core::results::reader::ResultReader;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Solver side files removed together with a discarded trial's model and results.
const SOLVER_SIDE_FILES: [&str; 4] = ["f04", "f06", "log", "op2"];
const DEFAULT_EXTENSION: &str = "bdf";

/// Basename of the artifacts written for `iteration`.
pub fn artifact_stem(iteration: usize) -> String {
    if iteration == 0 {
        "opt_initial".to_string()
    } else {
        format!("opt_{iteration}")
    }
}

/// Everything a finished evaluator hands back to its run.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub best: Option<BestState>,
    pub history: Vec<TrialRecord>,
    pub load_case: Option<u32>,
}

struct TrialResult {
    raw: f64,
    responses: Vec<(String, f64)>,
}

/// Turns a multiplier vector into a scalar objective by running one full trial.
///
/// The evaluator is the only owner of the working model, the iteration counter, the best
/// state and the history for the duration of a run.
pub struct ObjectiveEvaluator<'a, F: ModelFile> {
    context: RunContext<'a>,
    model: StructuralModel,
    metadata: F::Metadata,
    parameters: Vec<TunableParameter>,
    extension: String,
    solver: Box<dyn SolverRunner + 'a>,
    results: Box<dyn ResultReader + 'a>,
    extractor: ResponseExtractor,
    initial_mass: Option<f64>,
    iteration: usize,
    best: BestTracker,
    history: History,
}

impl<'a, F: ModelFile> ObjectiveEvaluator<'a, F> {
    pub fn new(
        context: RunContext<'a>,
        model: StructuralModel,
        metadata: F::Metadata,
        parameters: Vec<TunableParameter>,
        initial_mass: Option<f64>,
        solver: Box<dyn SolverRunner + 'a>,
        results: Box<dyn ResultReader + 'a>,
    ) -> Self {
        let config = context.config;
        let extension = config
            .model_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string();
        Self {
            context,
            model,
            metadata,
            parameters,
            extension,
            solver,
            results,
            extractor: ResponseExtractor::new(config.response.clone()),
            initial_mass,
            iteration: 0,
            best: BestTracker::new(config.mode),
            history: History::new(),
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn best(&self) -> Option<&BestState> {
        self.best.best()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn finish(self) -> EvaluationOutcome {
        EvaluationOutcome {
            load_case: self.extractor.load_case(),
            best: self.best.into_best(),
            history: self.history.into_records(),
        }
    }

    fn artifact_path(&self, iteration: usize) -> PathBuf {
        self.context
            .config
            .work_dir
            .join(format!("{}.{}", artifact_stem(iteration), self.extension))
    }

    /// Scales every tunable attribute and returns the mutated model's mass, if computable.
    fn apply(&mut self, multipliers: &[f64]) -> Option<f64> {
        for (parameter, &multiplier) in self.parameters.iter().zip(multipliers) {
            if let Some(property) = self.model.property_mut(parameter.id) {
                property.set_tunable_value(parameter.original * multiplier);
            }
        }
        match self.model.mass() {
            Ok(mass) => Some(mass),
            Err(e) => {
                debug!(iteration = self.iteration, error = %e, "Mass unavailable for trial");
                None
            }
        }
    }

    fn run_trial(&mut self, model_path: &Path) -> Result<TrialResult, TrialError> {
        F::write_to_path(&self.model, &self.metadata, model_path).map_err(|e| {
            TrialError::ModelWrite {
                path: model_path.display().to_string(),
                source: Box::new(e),
            }
        })?;

        self.solver.run(model_path)?;

        let result_path = self.results.result_path(model_path);
        let set = self.results.read(&result_path)?;
        let values = self.extractor.extract(&set)?;
        let raw = self.context.config.objective.eval(&values)?;

        let responses = self
            .context
            .config
            .objective
            .variables()
            .iter()
            .cloned()
            .zip(values)
            .collect();
        Ok(TrialResult { raw, responses })
    }

    /// Deletes every artifact of a trial; failures are ignored.
    fn discard_artifacts(&self, model_path: &Path) {
        let mut paths = vec![
            model_path.to_path_buf(),
            self.results.result_path(model_path),
        ];
        paths.extend(SOLVER_SIDE_FILES.iter().map(|ext| model_path.with_extension(ext)));
        for path in paths {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "Could not remove artifact");
                }
            }
        }
    }
}

impl<F: ModelFile> Objective for ObjectiveEvaluator<'_, F> {
    fn dimensions(&self) -> usize {
        self.parameters.len()
    }

    fn evaluate(&mut self, multipliers: &[f64]) -> Result<f64, EngineError> {
        if self.context.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if multipliers.len() != self.parameters.len() {
            return Err(EngineError::Internal(format!(
                "expected {} multipliers, got {}",
                self.parameters.len(),
                multipliers.len()
            )));
        }

        self.iteration += 1;
        let iteration = self.iteration;
        let config = self.context.config;
        let model_path = self.artifact_path(iteration);

        let mass = self.apply(multipliers);
        let change = mass
            .zip(self.initial_mass)
            .and_then(|(current, initial)| mass_change(current, initial));

        let (record, is_new_best) = match self.run_trial(&model_path) {
            Ok(trial) => {
                let mut objective = transform(trial.raw, config.mode);
                if let (true, Some(change)) = (config.mass_penalty.enabled, change) {
                    objective =
                        apply_mass_penalty(objective, config.mode, change, config.mass_penalty.factor);
                }
                let is_new_best = self.best.offer(BestState {
                    iteration,
                    raw: trial.raw,
                    multipliers: multipliers.to_vec(),
                    mass,
                    artifact: artifact_stem(iteration),
                });
                let record = TrialRecord {
                    iteration,
                    raw: trial.raw,
                    objective,
                    multipliers: multipliers.to_vec(),
                    mass,
                    responses: trial.responses,
                    failed: false,
                };
                (record, is_new_best)
            }
            Err(e) => {
                warn!(iteration, error = %e, "Trial failed");
                self.context
                    .reporter
                    .message(format!("ERROR in iteration {iteration}: {e}"));
                let record = TrialRecord {
                    iteration,
                    raw: SENTINEL_OBJECTIVE,
                    objective: SENTINEL_OBJECTIVE,
                    multipliers: multipliers.to_vec(),
                    mass: None,
                    responses: Vec::new(),
                    failed: true,
                };
                (record, false)
            }
        };

        let objective = record.objective;
        let progress = TrialProgress {
            iteration,
            budget: config.search.budget,
            raw: record.raw,
            best: self.best.best_raw(),
            mass: record.mass,
            mass_change_percent: record.mass.and(change).map(|c| c * 100.0),
            is_new_best,
            failed: record.failed,
        };
        self.history.push(record);

        info!("{progress}");
        self.context.reporter.report(Progress::Trial(progress));

        if !is_new_best {
            self.discard_artifacts(&model_path);
        }
        Ok(objective)
    }

    fn evaluations(&self) -> usize {
        self.iteration
    }

    fn is_cancelled(&self) -> bool {
        self.context.cancel.is_cancelled()
    }

    fn log(&self, message: &str) {
        info!("{message}");
        self.context.reporter.message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::bdf::BdfFile;
    use crate::core::results::reader::CsvResultReader;
    use crate::core::results::set::{ResponseKind, ResultSet};
    use crate::engine::cancel::CancellationToken;
    use crate::engine::config::{
        Component, MassPenaltyConfig, Mode, OptimizationConfig, OptimizationConfigBuilder,
        SearchMethod,
    };
    use crate::engine::context::resolve_parameters;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::solver::SolverError;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const DECK: &str = "\
SOL 101
CEND
BEGIN BULK
GRID,1,,0.0,0.0,0.0
GRID,2,,1.0,0.0,0.0
GRID,3,,1.0,1.0,0.0
GRID,4,,0.0,1.0,0.0
GRID,5,,2.0,0.0,0.0
GRID,6,,2.0,1.0,0.0
CQUAD4,1,100,1,2,3,4
CQUAD4,2,200,2,5,6,3
PSHELL,100,1,0.5
PSHELL,200,1,0.5
MAT1,1,7.0+4,,0.3,1.0
ENDDATA
";

    /// Writes displacement `[1/t100, 1/t200, 0]` for node 3, or nothing on scripted failures.
    struct FakeSolver {
        calls: usize,
        fail_on: Vec<usize>,
    }

    impl SolverRunner for FakeSolver {
        fn run(&mut self, model_path: &Path) -> Result<(), SolverError> {
            self.calls += 1;
            if self.fail_on.contains(&self.calls) {
                return Ok(());
            }
            let (model, _) = BdfFile::read_from_path(model_path).unwrap();
            let t = |id| model.property(id).unwrap().tunable_value().unwrap();
            let mut set = ResultSet::new();
            set.insert(1, ResponseKind::Displacement, 3, [1.0 / t(100), 1.0 / t(200), 0.0]);
            CsvResultReader::write(&set, &model_path.with_extension("csv")).unwrap();
            std::fs::write(model_path.with_extension("f06"), "log").unwrap();
            Ok(())
        }
    }

    fn config(dir: &TempDir, mode: Mode, penalty: bool) -> OptimizationConfig {
        OptimizationConfigBuilder::new()
            .model_path(dir.path().join("plate.bdf"))
            .work_dir(dir.path().to_path_buf())
            .selection("all")
            .method(SearchMethod::DifferentialEvolution)
            .budget(5)
            .multiplier_bounds(0.5, 2.0)
            .response_kind(ResponseKind::Displacement)
            .component(Component::X)
            .entity_ids(vec![3])
            .objective("w1")
            .mode(mode)
            .mass_penalty(MassPenaltyConfig {
                enabled: penalty,
                factor: 1.0,
            })
            .solver_executable("fake".into())
            .build()
            .unwrap()
    }

    fn evaluator<'a>(
        context: RunContext<'a>,
        fail_on: Vec<usize>,
    ) -> ObjectiveEvaluator<'a, BdfFile> {
        let (model, metadata) = BdfFile::read_from(&mut Cursor::new(DECK)).unwrap();
        let parameters = resolve_parameters(&model, "all").unwrap().tunable;
        let initial_mass = model.mass().ok();
        ObjectiveEvaluator::new(
            context,
            model,
            metadata,
            parameters,
            initial_mass,
            Box::new(FakeSolver { calls: 0, fail_on }),
            Box::new(CsvResultReader),
        )
    }

    #[test]
    fn artifact_stems() {
        assert_eq!(artifact_stem(0), "opt_initial");
        assert_eq!(artifact_stem(7), "opt_7");
    }

    #[test]
    fn successful_trial_scales_properties_and_records_result() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Minimize, false);
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![]);

        let value = evaluator.evaluate(&[2.0, 1.0]).unwrap();
        assert!((value - 1.0).abs() < 1e-9);

        let best = evaluator.best().unwrap();
        assert_eq!(best.iteration, 1);
        assert_eq!(best.artifact, "opt_1");
        assert!((best.mass.unwrap() - 1.5).abs() < 1e-9);
        assert!(dir.path().join("opt_1.bdf").exists());

        let record = &evaluator.history().records()[0];
        assert_eq!(record.responses, vec![("w1".to_string(), 1.0)]);
        assert!(!record.failed);
    }

    #[test]
    fn mass_penalty_scales_the_returned_objective_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Minimize, true);
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![]);

        let value = evaluator.evaluate(&[2.0, 1.0]).unwrap();
        assert!((value - 1.5).abs() < 1e-9);
        assert!((evaluator.best().unwrap().raw - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failed_trial_yields_sentinel_and_is_still_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Minimize, false);
        let messages = Arc::new(Mutex::new(Vec::new()));
        let reported_masses = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        let mass_sink = Arc::clone(&reported_masses);
        let reporter = ProgressReporter::with_callback(Box::new(move |event| match event {
            Progress::Message(text) => sink.lock().unwrap().push(text),
            Progress::Trial(trial) => mass_sink.lock().unwrap().push(trial.mass),
            _ => {}
        }));
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![1]);

        assert_eq!(evaluator.evaluate(&[1.0, 1.0]).unwrap(), SENTINEL_OBJECTIVE);
        assert_eq!(evaluator.history().len(), 1);
        assert!(evaluator.history().records()[0].failed);
        assert!(evaluator.history().records()[0].mass.is_none());
        assert_eq!(reported_masses.lock().unwrap()[0], None);
        assert!(evaluator.best().is_none());
        assert!(!dir.path().join("opt_1.bdf").exists());
        assert!(messages.lock().unwrap()[0].starts_with("ERROR in iteration 1:"));

        evaluator.evaluate(&[1.0, 1.0]).unwrap();
        assert_eq!(evaluator.best().unwrap().iteration, 2);
        assert!(evaluator.history().records()[1].mass.is_some());
    }

    #[test]
    fn non_improving_trials_have_their_artifacts_removed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Minimize, false);
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![]);

        evaluator.evaluate(&[2.0, 1.0]).unwrap();
        evaluator.evaluate(&[1.0, 1.0]).unwrap();

        for ext in ["bdf", "csv", "f06"] {
            assert!(dir.path().join(format!("opt_1.{ext}")).exists());
            assert!(!dir.path().join(format!("opt_2.{ext}")).exists());
        }
        assert_eq!(evaluator.iteration(), 2);
    }

    #[test]
    fn cancellation_is_checked_before_the_trial_starts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Maximize, false);
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![]);

        evaluator.evaluate(&[1.0, 1.0]).unwrap();
        cancel.cancel();
        assert!(matches!(
            evaluator.evaluate(&[1.0, 1.0]),
            Err(EngineError::Cancelled)
        ));
        assert!(evaluator.is_cancelled());

        let outcome = evaluator.finish();
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.load_case, Some(1));
    }

    #[test]
    fn multiplier_count_must_match_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Minimize, false);
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![]);
        assert!(matches!(
            evaluator.evaluate(&[1.0]),
            Err(EngineError::Internal(_))
        ));
        assert_eq!(evaluator.history().len(), 0);
    }

    #[test]
    fn maximize_returns_the_negated_result() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, Mode::Maximize, false);
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let mut evaluator = evaluator(RunContext::new(&config, &reporter, &cancel), vec![]);
        let value = evaluator.evaluate(&[0.5, 1.0]).unwrap();
        assert!((value + 4.0).abs() < 1e-9);
    }
}
