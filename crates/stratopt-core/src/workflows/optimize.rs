use crate::core::io::traits::ModelFile;
use crate::core::results::reader::{CsvResultReader, ResultReader};
use crate::engine::backend::{Objective, backend_for};
use crate::engine::cancel::CancellationToken;
use crate::engine::config::OptimizationConfig;
use crate::engine::context::{RunContext, resolve_parameters};
use crate::engine::error::EngineError;
use crate::engine::evaluator::ObjectiveEvaluator;
use crate::engine::progress::{Progress, ProgressCallback, ProgressReporter};
use crate::engine::solver::{SolverProcessManager, SolverRunner};
use crate::engine::summary::{RunSummary, SummarySink};
use std::fs;
use std::thread::{self, JoinHandle};
use tracing::{error, info, instrument, warn};

const BANNER_WIDTH: usize = 50;

/// External collaborators of a run.
pub struct RunServices {
    pub solver: Box<dyn SolverRunner>,
    pub results: Box<dyn ResultReader>,
    pub sink: Option<Box<dyn SummarySink>>,
}

impl RunServices {
    /// The OS-backed solver manager and the CSV result reader, without persistence.
    pub fn standard(config: &OptimizationConfig) -> Self {
        Self {
            solver: Box::new(SolverProcessManager::new(config.solver.clone())),
            results: Box::new(CsvResultReader),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn SummarySink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// Runs one optimization to completion on the calling thread.
///
/// The observer receives exactly one [`Progress::Finished`] event, whatever the outcome.
/// Cancellation surfaces as [`EngineError::Cancelled`] and a "stopped by user" message.
///
/// # Errors
///
/// Returns [`EngineError`] for configuration, model, baseline-mass, and persistence
/// failures, and for cancellation.
#[instrument(skip_all, name = "optimization_workflow")]
pub fn run<F: ModelFile>(
    config: &OptimizationConfig,
    services: RunServices,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<RunSummary, EngineError> {
    let RunServices {
        solver,
        results,
        sink,
    } = services;
    let context = RunContext::new(config, reporter, cancel);

    let result = execute::<F>(context, solver, results).and_then(|summary| {
        if let Some(mut sink) = sink {
            sink.persist(&summary).map_err(EngineError::Summary)?;
        }
        Ok(summary)
    });

    let (success, message) = match &result {
        Ok(_) => (true, "Optimization completed successfully".to_string()),
        Err(EngineError::Cancelled) => (false, "Optimization stopped by user".to_string()),
        Err(e) => (false, e.to_string()),
    };
    if success {
        info!("{message}");
    } else if result.as_ref().is_err_and(EngineError::is_cancelled) {
        warn!("{message}");
    } else {
        error!("{message}");
    }
    reporter.report(Progress::Finished { success, message });
    result
}

fn execute<F: ModelFile>(
    context: RunContext<'_>,
    solver: Box<dyn SolverRunner>,
    results: Box<dyn ResultReader>,
) -> Result<RunSummary, EngineError> {
    let config = context.config;
    let reporter = context.reporter;
    let log = |text: String| {
        info!("{text}");
        reporter.message(text);
    };

    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    log(format!("Loading BDF file: {}", config.model_path.display()));
    let (model, metadata) =
        F::read_from_path(&config.model_path).map_err(|e| EngineError::ModelLoad {
            path: config.model_path.display().to_string(),
            source: Box::new(e),
        })?;

    let initial_mass = match model.mass() {
        Ok(mass) => {
            reporter.report(Progress::InitialMass(mass));
            log(format!("Initial mass: {mass:.2}"));
            Some(mass)
        }
        Err(e) if config.mass_penalty.enabled => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Baseline mass unavailable");
            log(format!("Warning: initial mass unavailable: {e}"));
            None
        }
    };

    log(format!("Total properties in model: {}", model.property_count()));
    let parameters = resolve_parameters(&model, &config.selection)?;
    for id in &parameters.missing {
        log(format!("Warning: Property {id} not found in model"));
    }
    log(format!(
        "Selected {} properties for optimization",
        parameters.tunable.len() + parameters.unsupported.len()
    ));
    for (id, card) in &parameters.unsupported {
        log(format!("Warning: Property {id} type {card} is not supported"));
    }
    log(format!("Optimizing {} properties", parameters.tunable.len()));
    log(format!(
        "Result type: {}, Component: {}",
        config.response.kind.label(),
        config.response.component
    ));

    fs::create_dir_all(&config.work_dir).map_err(|source| EngineError::Io {
        path: config.work_dir.display().to_string(),
        source,
    })?;
    reporter.report(Progress::PhaseFinish);

    let backend = backend_for(&config.search);
    let budget = config.search.budget;
    let banner = "=".repeat(BANNER_WIDTH);
    log(banner.clone());
    log("Starting optimization...".to_string());
    log(banner);
    log(format!("Using optimization method: {}", config.search.method));
    log(format!("Target iterations: {budget}"));
    for line in backend.describe(parameters.tunable.len(), budget) {
        log(line);
    }

    reporter.report(Progress::PhaseStart {
        name: "Optimization",
    });
    reporter.report(Progress::TaskStart {
        total_steps: budget as u64,
    });

    let bounds = vec![
        (config.search.min_multiplier, config.search.max_multiplier);
        parameters.tunable.len()
    ];
    let mut evaluator = ObjectiveEvaluator::<F>::new(
        context,
        model,
        metadata,
        parameters.tunable.clone(),
        initial_mass,
        solver,
        results,
    );
    let search = backend.minimize(&mut evaluator, &bounds, budget);

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let search = search?;
    if evaluator.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    info!(
        backend = backend.name(),
        requested = search.evaluations,
        performed = evaluator.iteration(),
        "Search finished"
    );

    let summary = RunSummary::new(config, &parameters.tunable, initial_mass, evaluator.finish());
    if let Some(best) = &summary.best {
        log(format!(
            "Best result: {:.5} (iteration {}, {})",
            best.raw, best.iteration, best.artifact
        ));
    } else {
        log("No trial produced a usable result".to_string());
    }
    Ok(summary)
}

/// Handle to a run executing on its own worker thread.
pub struct RunHandle {
    cancel: CancellationToken,
    handle: JoinHandle<Result<RunSummary, EngineError>>,
}

impl RunHandle {
    /// Requests cooperative cancellation; the trial in flight still completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the run has ended.
    pub fn join(self) -> Result<RunSummary, EngineError> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(EngineError::Internal("optimization thread panicked".into())))
    }
}

/// Starts [`run`] on a dedicated worker thread.
///
/// Events reach `callback` from the worker thread; the callback must not block for long.
///
/// # Errors
///
/// Returns [`EngineError::Internal`] if the thread cannot be started.
pub fn spawn<F: ModelFile + 'static>(
    config: OptimizationConfig,
    services: RunServices,
    callback: ProgressCallback<'static>,
) -> Result<RunHandle, EngineError> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = thread::Builder::new()
        .name("stratopt-run".into())
        .spawn(move || {
            let reporter = ProgressReporter::with_callback(callback);
            run::<F>(&config, services, &reporter, &token)
        })
        .map_err(|e| EngineError::Internal(format!("failed to start optimization thread: {e}")))?;
    Ok(RunHandle { cancel, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::bdf::BdfFile;
    use crate::core::results::set::{ResponseKind, ResultSet};
    use crate::engine::config::{
        Component, MassPenaltyConfig, Mode, OptimizationConfigBuilder, SearchMethod,
    };
    use crate::engine::error::BoxedError;
    use crate::engine::objective::SENTINEL_OBJECTIVE;
    use crate::engine::solver::SolverError;
    use std::path::Path;
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
PBUSH,300,K,1.0+3
MAT1,1,7.0+4,,0.3,1.0
ENDDATA
";

    /// In-process solver: node 3 deflects by `1/t100 + 1/t200` in X.
    struct FakeSolver {
        calls: Arc<Mutex<usize>>,
        fail_on: Vec<usize>,
    }

    impl SolverRunner for FakeSolver {
        fn run(&mut self, model_path: &Path) -> Result<(), SolverError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_on.contains(&call) {
                return Ok(());
            }
            let (model, _) = BdfFile::read_from_path(model_path).unwrap();
            let t = |id| model.property(id).unwrap().tunable_value().unwrap();
            let mut set = ResultSet::new();
            set.insert(4, ResponseKind::Displacement, 3, [1.0 / t(100) + 1.0 / t(200), 0.0, 0.0]);
            CsvResultReader::write(&set, &model_path.with_extension("csv")).unwrap();
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        summaries: Arc<Mutex<Vec<RunSummary>>>,
        fail: bool,
    }

    impl SummarySink for RecordingSink {
        fn persist(&mut self, summary: &RunSummary) -> Result<(), BoxedError> {
            if self.fail {
                return Err("disk full".into());
            }
            self.summaries.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<Progress>>>);

    impl Events {
        fn reporter(&self) -> ProgressReporter<'static> {
            let events = Arc::clone(&self.0);
            ProgressReporter::with_callback(Box::new(move |e| events.lock().unwrap().push(e)))
        }

        fn finished(&self) -> Vec<(bool, String)> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Progress::Finished { success, message } => Some((*success, message.clone())),
                    _ => None,
                })
                .collect()
        }

        fn trials(&self) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, Progress::Trial(_)))
                .count()
        }

        fn messages(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Progress::Message(m) => Some(m.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn setup(method: SearchMethod, budget: usize, selection: &str) -> (TempDir, OptimizationConfig) {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("plate.bdf");
        fs::write(&model_path, DECK).unwrap();
        let config = OptimizationConfigBuilder::new()
            .model_path(model_path)
            .work_dir(dir.path().join("trials"))
            .selection(selection)
            .method(method)
            .budget(budget)
            .multiplier_bounds(0.5, 2.0)
            .response_kind(ResponseKind::Displacement)
            .component(Component::X)
            .entity_ids(vec![3])
            .objective("w1")
            .mode(Mode::Minimize)
            .mass_penalty(MassPenaltyConfig {
                enabled: true,
                factor: 0.5,
            })
            .solver_executable("fake".into())
            .build()
            .unwrap();
        (dir, config)
    }

    fn services(fail_on: Vec<usize>, sink: &RecordingSink) -> RunServices {
        RunServices {
            solver: Box::new(FakeSolver {
                calls: Arc::default(),
                fail_on,
            }),
            results: Box::new(CsvResultReader),
            sink: Some(Box::new(sink.clone())),
        }
    }

    #[test]
    fn gaussian_process_run_completes_and_persists_once() {
        let (_dir, config) = setup(SearchMethod::GaussianProcess, 8, "all");
        let events = Events::default();
        let sink = RecordingSink::default();

        let summary = run::<BdfFile>(
            &config,
            services(vec![2], &sink),
            &events.reporter(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(summary.total_iterations, 8);
        assert_eq!(summary.history.len(), events.trials());
        assert_eq!(summary.history[1].raw, SENTINEL_OBJECTIVE);
        assert_eq!(summary.load_case, Some(4));
        assert_eq!(summary.properties.len(), 2);
        assert!(summary.best.is_some());
        assert_eq!(
            events.finished(),
            vec![(true, "Optimization completed successfully".to_string())]
        );
        assert_eq!(sink.summaries.lock().unwrap().len(), 1);

        let best = summary.best.unwrap();
        assert!(config.work_dir.join(format!("{}.bdf", best.artifact)).exists());
        assert!(
            summary
                .history
                .iter()
                .filter(|r| !r.failed)
                .all(|r| r.raw >= best.raw)
        );
    }

    #[test]
    fn pre_run_log_names_unsupported_properties_and_method() {
        let (_dir, config) = setup(SearchMethod::BoostedTrees, 4, "all");
        let events = Events::default();
        run::<BdfFile>(
            &config,
            services(vec![], &RecordingSink::default()),
            &events.reporter(),
            &CancellationToken::new(),
        )
        .unwrap();

        let messages = events.messages();
        for expected in [
            "Initial mass: 1.00",
            "Total properties in model: 3",
            "Selected 3 properties for optimization",
            "Warning: Property 300 type PBUSH is not supported",
            "Optimizing 2 properties",
            "Result type: Displacement, Component: X",
            "Target iterations: 4",
            "GBRT Minimize: n_calls=4, n_initial=3",
        ] {
            assert!(messages.iter().any(|m| m == expected), "missing '{expected}'");
        }
    }

    #[test]
    fn differential_evolution_stops_at_the_budget() {
        let (_dir, config) = setup(SearchMethod::DifferentialEvolution, 60, "100,200");
        let events = Events::default();
        let summary = run::<BdfFile>(
            &config,
            services(vec![], &RecordingSink::default()),
            &events.reporter(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(summary.total_iterations, 60);
        assert!(
            events
                .messages()
                .contains(&"Stopping: reached target of 60 evaluations".to_string())
        );
    }

    #[test]
    fn cancelling_after_a_trial_stops_before_the_next() {
        let (_dir, config) = setup(SearchMethod::GaussianProcess, 10, "all");
        let cancel = CancellationToken::new();
        let events = Events::default();
        let trigger = cancel.clone();
        let log = Arc::clone(&events.0);
        let reporter = ProgressReporter::with_callback(Box::new(move |e| {
            if let Progress::Trial(t) = &e {
                if t.iteration == 3 {
                    trigger.cancel();
                }
            }
            log.lock().unwrap().push(e);
        }));
        let sink = RecordingSink::default();

        let result = run::<BdfFile>(&config, services(vec![], &sink), &reporter, &cancel);
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(events.trials(), 3);
        assert_eq!(
            events.finished(),
            vec![(false, "Optimization stopped by user".to_string())]
        );
        assert!(sink.summaries.lock().unwrap().is_empty());
    }

    #[test]
    fn configuration_errors_abort_before_any_trial() {
        let (_dir, config) = setup(SearchMethod::GaussianProcess, 5, "300");
        let events = Events::default();
        let result = run::<BdfFile>(
            &config,
            services(vec![], &RecordingSink::default()),
            &events.reporter(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
        assert_eq!(events.trials(), 0);
        let finished = events.finished();
        assert_eq!(finished.len(), 1);
        assert!(!finished[0].0);
        assert!(finished[0].1.contains("No valid properties selected for optimization"));
    }

    #[test]
    fn missing_model_fails_the_run() {
        let (dir, mut config) = setup(SearchMethod::GaussianProcess, 5, "all");
        config.model_path = dir.path().join("absent.bdf");
        let events = Events::default();
        let result = run::<BdfFile>(
            &config,
            services(vec![], &RecordingSink::default()),
            &events.reporter(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(EngineError::ModelLoad { .. })));
        assert_eq!(events.finished().len(), 1);
    }

    #[test]
    fn persistence_failure_turns_completion_into_failure() {
        let (_dir, config) = setup(SearchMethod::GaussianProcess, 3, "all");
        let events = Events::default();
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let result = run::<BdfFile>(
            &config,
            services(vec![], &sink),
            &events.reporter(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(EngineError::Summary(_))));
        let finished = events.finished();
        assert_eq!(finished.len(), 1);
        assert!(!finished[0].0);
    }

    #[test]
    fn spawned_run_reports_from_the_worker_thread() {
        let (_dir, config) = setup(SearchMethod::GaussianProcess, 4, "all");
        let events = Events::default();
        let log = Arc::clone(&events.0);
        let handle = spawn::<BdfFile>(
            config,
            services(vec![], &RecordingSink::default()),
            Box::new(move |e| log.lock().unwrap().push(e)),
        )
        .unwrap();

        let summary = handle.join().unwrap();
        assert_eq!(summary.total_iterations, 4);
        assert_eq!(events.finished().len(), 1);
    }

    #[test]
    fn cancelled_handle_ends_stopped() {
        let (_dir, config) = setup(SearchMethod::GaussianProcess, 50, "all");
        let events = Events::default();
        let log = Arc::clone(&events.0);
        let handle = spawn::<BdfFile>(
            config,
            services(vec![], &RecordingSink::default()),
            Box::new(move |e| log.lock().unwrap().push(e)),
        )
        .unwrap();
        handle.cancel();

        assert!(matches!(handle.join(), Err(EngineError::Cancelled)));
        assert!(events.trials() < 50);
        assert_eq!(
            events.finished(),
            vec![(false, "Optimization stopped by user".to_string())]
        );
    }
}
