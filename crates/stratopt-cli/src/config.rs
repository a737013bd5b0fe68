pub mod defaults;

use crate::cli::{MassPenaltyToggle, OptimizeArgs};
use crate::error::{CliError, Result};
use defaults::{DefaultsConfig, default_objective};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use stratopt::engine::config as core_config;
use stratopt::engine::config::{Mode, ResponseKind};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSearchConfig {
    method: Option<String>,
    budget: Option<usize>,
    #[serde(rename = "min-multiplier")]
    min_multiplier: Option<f64>,
    #[serde(rename = "max-multiplier")]
    max_multiplier: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialResponseConfig {
    kind: Option<String>,
    component: Option<String>,
    #[serde(rename = "entity-ids")]
    entity_ids: Option<Vec<u32>>,
    objective: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialModeConfig {
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialMassPenaltyConfig {
    enabled: Option<bool>,
    factor: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSolverConfig {
    executable: Option<PathBuf>,
    flag: Option<String>,
    /// An empty name disables worker polling.
    #[serde(rename = "worker-process")]
    worker_process: Option<String>,
    #[serde(rename = "poll-interval-ms")]
    poll_interval_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialOptimizationConfig {
    #[serde(rename = "property-selection")]
    property_selection: Option<String>,
    #[serde(rename = "work-dir")]
    work_dir: Option<PathBuf>,
    search: Option<PartialSearchConfig>,
    response: Option<PartialResponseConfig>,
    mode: Option<PartialModeConfig>,
    #[serde(rename = "mass-penalty")]
    mass_penalty: Option<PartialMassPenaltyConfig>,
    solver: Option<PartialSolverConfig>,
}

impl PartialOptimizationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the file named by `--config`, or starts empty.
    pub fn load(args: &OptimizeArgs) -> Result<Self> {
        match &args.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Layers CLI flags over `-S` overrides over the file over built-in defaults.
    pub fn merge_with_cli(mut self, args: &OptimizeArgs) -> Result<core_config::OptimizationConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let search = self.search.take().unwrap_or_default();
        let response = self.response.take().unwrap_or_default();
        let penalty = self.mass_penalty.take().unwrap_or_default();
        let solver = self.solver.take().unwrap_or_default();

        let method = match args.method.as_ref().or(search.method.as_ref()) {
            Some(name) => name.parse().map_err(config_error)?,
            None => defaults.method,
        };
        let result_kind = match args.result_kind.as_deref().or(response.kind.as_deref()) {
            Some(name) => parse_result_kind(name)?,
            None => defaults.result_kind,
        };
        let component = match args.component.as_ref().or(response.component.as_ref()) {
            Some(name) => name.parse().map_err(config_error)?,
            None => defaults.component,
        };

        let entity_ids = args
            .entities
            .clone()
            .or(response.entity_ids)
            .ok_or_else(|| {
                CliError::Config(
                    "At least one response entity id is required (`response.entity-ids` or --entities)."
                        .to_string(),
                )
            })?;
        let objective = args
            .objective
            .clone()
            .or(response.objective)
            .unwrap_or_else(|| default_objective(entity_ids.len()));

        let mode = Self::merge_mode(args, self.mode.take())?;
        let mass_penalty = Self::merge_mass_penalty(
            args.mass_penalty,
            args.penalty_factor,
            penalty,
            &defaults,
        );

        let executable = args.solver.clone().or(solver.executable).ok_or_else(|| {
            CliError::Config(
                "A value for 'solver.executable' is required either in the config file or via --solver."
                    .to_string(),
            )
        })?;
        let worker_process = if args.no_worker_poll {
            None
        } else {
            let name = args
                .worker_process
                .clone()
                .or(solver.worker_process)
                .unwrap_or(defaults.worker_process);
            Some(name).filter(|n| !n.trim().is_empty())
        };
        let poll_interval_ms = solver.poll_interval_ms.unwrap_or(defaults.poll_interval_ms);

        let work_dir = args
            .work_dir
            .clone()
            .or(self.work_dir.take())
            .unwrap_or_else(|| model_directory(&args.input));

        core_config::OptimizationConfigBuilder::new()
            .model_path(args.input.clone())
            .work_dir(work_dir)
            .selection(
                args.properties
                    .clone()
                    .or(self.property_selection.take())
                    .unwrap_or(defaults.property_selection),
            )
            .method(method)
            .budget(args.budget.or(search.budget).unwrap_or(defaults.budget))
            .multiplier_bounds(
                args.min_multiplier
                    .or(search.min_multiplier)
                    .unwrap_or(defaults.min_multiplier),
                args.max_multiplier
                    .or(search.max_multiplier)
                    .unwrap_or(defaults.max_multiplier),
            )
            .seed(args.seed.or(search.seed).unwrap_or(defaults.seed))
            .response_kind(result_kind)
            .component(component)
            .entity_ids(entity_ids)
            .objective(objective)
            .mode(mode)
            .mass_penalty(mass_penalty)
            .solver_executable(executable)
            .solver_flag(
                args.solver_flag
                    .clone()
                    .or(solver.flag)
                    .unwrap_or(defaults.solver_flag),
            )
            .worker_process(worker_process)
            .poll_interval(Duration::from_millis(poll_interval_ms))
            .build()
            .map_err(config_error)
    }

    fn merge_mode(args: &OptimizeArgs, partial: Option<PartialModeConfig>) -> Result<Mode> {
        let partial = partial.unwrap_or_default();
        if let Some(target) = args.target {
            return Ok(Mode::Target(target));
        }
        let kind = args
            .mode
            .as_deref()
            .or(partial.kind.as_deref())
            .unwrap_or("minimize");
        match kind.trim().to_ascii_lowercase().as_str() {
            "minimize" => Ok(Mode::Minimize),
            "maximize" => Ok(Mode::Maximize),
            "target" => partial.value.map(Mode::Target).ok_or_else(|| {
                CliError::Config("Target mode requires `mode.value` or --target.".to_string())
            }),
            other => Err(CliError::Config(format!(
                "Unknown optimization mode '{}'",
                other
            ))),
        }
    }

    fn merge_mass_penalty(
        cli_flags: MassPenaltyToggle,
        cli_factor: Option<f64>,
        partial: PartialMassPenaltyConfig,
        defaults: &DefaultsConfig,
    ) -> core_config::MassPenaltyConfig {
        let enabled = if cli_flags.mass_penalty {
            true
        } else if cli_flags.no_mass_penalty {
            false
        } else {
            partial.enabled.unwrap_or(defaults.mass_penalty_enabled)
        };
        core_config::MassPenaltyConfig {
            enabled,
            factor: cli_factor
                .or(partial.factor)
                .unwrap_or(defaults.mass_penalty_factor),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value_str = value_str.trim();

            match key {
                "property-selection" => self.property_selection = Some(value_str.to_string()),
                "work-dir" => self.work_dir = Some(PathBuf::from(value_str)),
                "search.method" => self.search().method = Some(value_str.to_string()),
                "search.budget" => self.search().budget = Some(parse_value(key, value_str)?),
                "search.min-multiplier" => {
                    self.search().min_multiplier = Some(parse_value(key, value_str)?)
                }
                "search.max-multiplier" => {
                    self.search().max_multiplier = Some(parse_value(key, value_str)?)
                }
                "search.seed" => self.search().seed = Some(parse_value(key, value_str)?),
                "response.kind" => self.response().kind = Some(value_str.to_string()),
                "response.component" => self.response().component = Some(value_str.to_string()),
                "response.entity-ids" => {
                    let ids = value_str
                        .split(',')
                        .map(|id| parse_value(key, id.trim()))
                        .collect::<Result<Vec<u32>>>()?;
                    self.response().entity_ids = Some(ids);
                }
                "response.objective" => self.response().objective = Some(value_str.to_string()),
                "mode.type" => {
                    self.mode.get_or_insert_with(Default::default).kind =
                        Some(value_str.to_string())
                }
                "mode.value" => {
                    self.mode.get_or_insert_with(Default::default).value =
                        Some(parse_value(key, value_str)?)
                }
                "mass-penalty.enabled" => {
                    self.mass_penalty.get_or_insert_with(Default::default).enabled =
                        Some(parse_value(key, value_str)?)
                }
                "mass-penalty.factor" => {
                    self.mass_penalty.get_or_insert_with(Default::default).factor =
                        Some(parse_value(key, value_str)?)
                }
                "solver.executable" => self.solver().executable = Some(PathBuf::from(value_str)),
                "solver.flag" => self.solver().flag = Some(value_str.to_string()),
                "solver.worker-process" => {
                    self.solver().worker_process = Some(value_str.to_string())
                }
                "solver.poll-interval-ms" => {
                    self.solver().poll_interval_ms = Some(parse_value(key, value_str)?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn search(&mut self) -> &mut PartialSearchConfig {
        self.search.get_or_insert_with(Default::default)
    }

    fn response(&mut self) -> &mut PartialResponseConfig {
        self.response.get_or_insert_with(Default::default)
    }

    fn solver(&mut self) -> &mut PartialSolverConfig {
        self.solver.get_or_insert_with(Default::default)
    }
}

fn parse_value<T: FromStr>(key: &str, value_str: &str) -> Result<T> {
    value_str.parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: {}", key, value_str))
    })
}

fn parse_result_kind(name: &str) -> Result<ResponseKind> {
    match name.trim().to_ascii_lowercase().as_str() {
        "displacement" => Ok(ResponseKind::Displacement),
        "cbush-force" | "cbush" => Ok(ResponseKind::CBushForce),
        other => Err(CliError::Config(format!("Unknown result kind '{}'", other))),
    }
}

fn config_error(e: core_config::ConfigError) -> CliError {
    CliError::Config(e.to_string())
}

fn model_directory(model: &Path) -> PathBuf {
    match model.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use stratopt::engine::config::{Component, SearchMethod};
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    const FULL_CONFIG: &str = r#"
        property-selection = "1-10, 15"

        [search]
        method = "differential-evolution"
        budget = 120
        min-multiplier = 0.5
        max-multiplier = 2.0
        seed = 7

        [response]
        kind = "cbush-force"
        component = "Z"
        entity-ids = [101, 102]
        objective = "abs(w1) + 0.5*w2"

        [mode]
        type = "target"
        value = 12.5

        [mass-penalty]
        enabled = true
        factor = 2.0

        [solver]
        executable = "/opt/nastran/bin/nastran"
        flag = "scr=no"
        worker-process = "analysis.exe"
        poll-interval-ms = 250
    "#;

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn parse_args(extra: &[&str]) -> OptimizeArgs {
        let mut args = vec!["stratopt", "optimize", "-i", "models/wing.bdf"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Optimize(args) => args,
            other => panic!("Expected 'optimize' subcommand, got {other:?}"),
        }
    }

    fn merge(config_path: Option<&Path>, extra: &[&str]) -> Result<core_config::OptimizationConfig> {
        let mut argv: Vec<&str> = Vec::new();
        let path_string;
        if let Some(path) = config_path {
            path_string = path.to_str().unwrap().to_string();
            argv.extend_from_slice(&["-c", &path_string]);
        }
        argv.extend_from_slice(extra);
        let args = parse_args(&argv);
        PartialOptimizationConfig::load(&args)?.merge_with_cli(&args)
    }

    #[test]
    fn file_values_are_used_when_no_flags_are_given() {
        let path = write_config_file("full.toml", FULL_CONFIG);
        let config = merge(Some(&path), &[]).unwrap();

        assert_eq!(config.selection, "1-10, 15");
        assert_eq!(config.search.method, SearchMethod::DifferentialEvolution);
        assert_eq!(config.search.budget, 120);
        assert_eq!(config.search.min_multiplier, 0.5);
        assert_eq!(config.search.max_multiplier, 2.0);
        assert_eq!(config.search.seed, 7);
        assert_eq!(config.response.kind, ResponseKind::CBushForce);
        assert_eq!(config.response.component, Component::Z);
        assert_eq!(config.response.entity_ids, vec![101, 102]);
        assert_eq!(config.objective.source(), "abs(w1) + 0.5*w2");
        assert_eq!(config.mode, Mode::Target(12.5));
        assert!(config.mass_penalty.enabled);
        assert_eq!(config.mass_penalty.factor, 2.0);
        assert_eq!(config.solver.executable, PathBuf::from("/opt/nastran/bin/nastran"));
        assert_eq!(config.solver.flag, "scr=no");
        assert_eq!(config.solver.worker_process.as_deref(), Some("analysis.exe"));
        assert_eq!(config.solver.poll_interval, Duration::from_millis(250));
        assert_eq!(config.work_dir, PathBuf::from("models"));
    }

    #[test]
    fn defaults_fill_everything_but_solver_and_entities() {
        let config = merge(None, &["--solver", "nastran", "-e", "7,8,9"]).unwrap();
        let defaults = DefaultsConfig::default();

        assert_eq!(config.selection, "all");
        assert_eq!(config.search.method, defaults.method);
        assert_eq!(config.search.budget, defaults.budget);
        assert_eq!(config.search.min_multiplier, defaults.min_multiplier);
        assert_eq!(config.search.max_multiplier, defaults.max_multiplier);
        assert_eq!(config.response.kind, ResponseKind::Displacement);
        assert_eq!(config.response.component, Component::XYZ);
        assert_eq!(config.objective.source(), "w1 + w2 + w3");
        assert_eq!(config.mode, Mode::Minimize);
        assert!(!config.mass_penalty.enabled);
        assert_eq!(config.solver.flag, "scr=yes");
        assert_eq!(config.solver.worker_process.as_deref(), Some("nastran.exe"));
    }

    #[test]
    fn cli_args_override_file_values() {
        let path = write_config_file("override.toml", FULL_CONFIG);
        let config = merge(
            Some(&path),
            &[
                "--method",
                "gp",
                "-n",
                "40",
                "--component",
                "xy",
                "--mode",
                "maximize",
                "--no-mass-penalty",
                "--no-worker-poll",
                "--work-dir",
                "/tmp/trials",
            ],
        )
        .unwrap();

        assert_eq!(config.search.method, SearchMethod::GaussianProcess);
        assert_eq!(config.search.budget, 40);
        assert_eq!(config.response.component, Component::XY);
        assert_eq!(config.mode, Mode::Maximize);
        assert!(!config.mass_penalty.enabled);
        assert_eq!(config.mass_penalty.factor, 2.0);
        assert_eq!(config.solver.worker_process, None);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/trials"));
    }

    #[test]
    fn target_flag_implies_target_mode() {
        let config = merge(None, &["--solver", "nastran", "-e", "1", "--target", "3.5"]).unwrap();
        assert_eq!(config.mode, Mode::Target(3.5));
    }

    #[test]
    fn set_value_overrides_file_but_not_flags() {
        let path = write_config_file("set.toml", FULL_CONFIG);
        let config = merge(
            Some(&path),
            &[
                "-S",
                "search.budget=80",
                "-S",
                "response.entity-ids=5, 6, 7",
                "-S",
                "response.objective=w1 - w3",
                "-S",
                "solver.worker-process=",
                "-S",
                "search.seed=99",
                "--seed",
                "3",
            ],
        )
        .unwrap();

        assert_eq!(config.search.budget, 80);
        assert_eq!(config.response.entity_ids, vec![5, 6, 7]);
        assert_eq!(config.objective.source(), "w1 - w3");
        assert_eq!(config.solver.worker_process, None);
        assert_eq!(config.search.seed, 3);
    }

    #[test]
    fn missing_solver_is_a_configuration_error() {
        let result = merge(None, &["-e", "1"]);
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("solver.executable")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn missing_entities_is_a_configuration_error() {
        let result = merge(None, &["--solver", "nastran"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("entity")));
    }

    #[test]
    fn target_mode_without_value_is_rejected() {
        let result = merge(None, &["--solver", "nastran", "-e", "1", "--mode", "target"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("mode.value")));
    }

    #[test]
    fn core_validation_errors_surface_as_config_errors() {
        let result = merge(
            None,
            &["--solver", "nastran", "-e", "1", "--min-multiplier", "2", "--max-multiplier", "1"],
        );
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("multiplier bounds")));

        let result = merge(None, &["--solver", "nastran", "-e", "1", "--objective", "w2"]);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_keys_in_file_are_rejected() {
        let path = write_config_file("unknown.toml", "[search]\nbudgett = 5\n");
        let result = merge(Some(&path), &[]);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn malformed_and_unknown_set_values_are_rejected() {
        let result = merge(None, &["-S", "search.budget"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("KEY=VALUE")));

        let result = merge(None, &["-S", "search.speed=3"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("Unsupported")));

        let result = merge(None, &["-S", "search.budget=many"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("Invalid value")));
    }

    #[test]
    fn work_dir_of_a_bare_file_name_is_the_current_directory() {
        assert_eq!(model_directory(Path::new("wing.bdf")), PathBuf::from("."));
        assert_eq!(
            model_directory(Path::new("/data/wing.bdf")),
            PathBuf::from("/data")
        );
    }
}
