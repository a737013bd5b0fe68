use crate::core::expr::{ExprError, Expression, response_variables};
pub use crate::core::results::set::ResponseKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_SOLVER_FLAG: &str = "scr=yes";
pub const DEFAULT_WORKER_PROCESS: &str = "nastran.exe";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid multiplier bounds [{min}, {max}]: require 0 < min < max")]
    InvalidBounds { min: f64, max: f64 },
    #[error("Evaluation budget must be at least 1")]
    InvalidBudget,
    #[error("Mass penalty factor must be a non-negative number (got {0})")]
    InvalidPenaltyFactor(f64),
    #[error("Target value must be finite (got {0})")]
    InvalidTarget(f64),
    #[error("At least one response entity id is required")]
    NoResponseEntities,
    #[error("Solver poll interval must be positive")]
    InvalidPollInterval,
    #[error("Invalid objective expression: {0}")]
    Expression(#[from] ExprError),
    #[error("Invalid property selection token '{token}'")]
    InvalidSelection { token: String },
    #[error("No valid properties selected for optimization")]
    NoTunableProperties,
    #[error("Unknown {what} '{value}'")]
    UnknownValue { what: &'static str, value: String },
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Mode {
    Minimize,
    Maximize,
    Target(f64),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
            Self::Target(_) => "target",
        }
    }

    pub fn target(&self) -> Option<f64> {
        match self {
            Self::Target(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(t) => write!(f, "target ({t})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Which axes of a three-component result a response reads.
///
/// Single axes are taken as signed values; composite components are the Euclidean norm
/// of their axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    X,
    Y,
    Z,
    XY,
    XZ,
    YZ,
    XYZ,
}

impl Component {
    pub fn axes(&self) -> &'static [usize] {
        match self {
            Self::X => &[0],
            Self::Y => &[1],
            Self::Z => &[2],
            Self::XY => &[0, 1],
            Self::XZ => &[0, 2],
            Self::YZ => &[1, 2],
            Self::XYZ => &[0, 1, 2],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::XY => "XY",
            Self::XZ => "XZ",
            Self::YZ => "YZ",
            Self::XYZ => "XYZ",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Component {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "Z" => Ok(Self::Z),
            "XY" => Ok(Self::XY),
            "XZ" => Ok(Self::XZ),
            "YZ" => Ok(Self::YZ),
            "XYZ" => Ok(Self::XYZ),
            _ => Err(ConfigError::UnknownValue {
                what: "component",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSpec {
    pub kind: ResponseKind,
    pub component: Component,
    /// One response variable `w{i}` is produced per entity, in this order.
    pub entity_ids: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MassPenaltyConfig {
    pub enabled: bool,
    pub factor: f64,
}

impl Default for MassPenaltyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMethod {
    GaussianProcess,
    BoostedTrees,
    DifferentialEvolution,
}

impl SearchMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::GaussianProcess => "Bayesian optimization (Gaussian process)",
            Self::BoostedTrees => "Bayesian optimization (gradient-boosted trees)",
            Self::DifferentialEvolution => "Differential evolution",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SearchMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian-process" | "gp" => Ok(Self::GaussianProcess),
            "boosted-trees" | "gbrt" => Ok(Self::BoostedTrees),
            "differential-evolution" | "de" => Ok(Self::DifferentialEvolution),
            _ => Err(ConfigError::UnknownValue {
                what: "search method",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub method: SearchMethod,
    /// Nominal number of objective evaluations.
    pub budget: usize,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub executable: PathBuf,
    /// Fixed argument passed after the model path.
    pub flag: String,
    /// Process name of the compute worker to wait for; `None` waits on the launched child only.
    pub worker_process: Option<String>,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    pub model_path: PathBuf,
    /// Directory receiving every per-trial artifact.
    pub work_dir: PathBuf,
    pub selection: String,
    pub search: SearchConfig,
    pub response: ResponseSpec,
    pub objective: Expression,
    pub mode: Mode,
    pub mass_penalty: MassPenaltyConfig,
    pub solver: SolverConfig,
}

#[derive(Default)]
pub struct OptimizationConfigBuilder {
    model_path: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    selection: Option<String>,
    method: Option<SearchMethod>,
    budget: Option<usize>,
    min_multiplier: Option<f64>,
    max_multiplier: Option<f64>,
    seed: Option<u64>,
    response_kind: Option<ResponseKind>,
    component: Option<Component>,
    entity_ids: Option<Vec<u32>>,
    objective: Option<String>,
    mode: Option<Mode>,
    mass_penalty: Option<MassPenaltyConfig>,
    solver_executable: Option<PathBuf>,
    solver_flag: Option<String>,
    worker_process: Option<Option<String>>,
    poll_interval: Option<Duration>,
}

impl OptimizationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_path(mut self, path: PathBuf) -> Self {
        self.model_path = Some(path);
        self
    }
    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }
    pub fn method(mut self, method: SearchMethod) -> Self {
        self.method = Some(method);
        self
    }
    pub fn budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }
    pub fn multiplier_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_multiplier = Some(min);
        self.max_multiplier = Some(max);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.response_kind = Some(kind);
        self
    }
    pub fn component(mut self, component: Component) -> Self {
        self.component = Some(component);
        self
    }
    pub fn entity_ids(mut self, ids: Vec<u32>) -> Self {
        self.entity_ids = Some(ids);
        self
    }
    pub fn objective(mut self, source: impl Into<String>) -> Self {
        self.objective = Some(source.into());
        self
    }
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn mass_penalty(mut self, penalty: MassPenaltyConfig) -> Self {
        self.mass_penalty = Some(penalty);
        self
    }
    pub fn solver_executable(mut self, path: PathBuf) -> Self {
        self.solver_executable = Some(path);
        self
    }
    pub fn solver_flag(mut self, flag: impl Into<String>) -> Self {
        self.solver_flag = Some(flag.into());
        self
    }
    pub fn worker_process(mut self, name: Option<String>) -> Self {
        self.worker_process = Some(name);
        self
    }
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<OptimizationConfig, ConfigError> {
        let min_multiplier = self
            .min_multiplier
            .ok_or(ConfigError::MissingParameter("min_multiplier"))?;
        let max_multiplier = self
            .max_multiplier
            .ok_or(ConfigError::MissingParameter("max_multiplier"))?;
        if !(min_multiplier.is_finite()
            && max_multiplier.is_finite()
            && min_multiplier > 0.0
            && min_multiplier < max_multiplier)
        {
            return Err(ConfigError::InvalidBounds {
                min: min_multiplier,
                max: max_multiplier,
            });
        }

        let budget = self.budget.ok_or(ConfigError::MissingParameter("budget"))?;
        if budget == 0 {
            return Err(ConfigError::InvalidBudget);
        }

        let search = SearchConfig {
            method: self.method.ok_or(ConfigError::MissingParameter("method"))?,
            budget,
            min_multiplier,
            max_multiplier,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        };

        let entity_ids = self
            .entity_ids
            .ok_or(ConfigError::MissingParameter("entity_ids"))?;
        if entity_ids.is_empty() {
            return Err(ConfigError::NoResponseEntities);
        }
        let response = ResponseSpec {
            kind: self
                .response_kind
                .ok_or(ConfigError::MissingParameter("response_kind"))?,
            component: self
                .component
                .ok_or(ConfigError::MissingParameter("component"))?,
            entity_ids,
        };

        let objective_source = self
            .objective
            .ok_or(ConfigError::MissingParameter("objective"))?;
        let objective = Expression::parse(
            &objective_source,
            &response_variables(response.entity_ids.len()),
        )?;

        let mode = self.mode.ok_or(ConfigError::MissingParameter("mode"))?;
        if let Mode::Target(t) = mode {
            if !t.is_finite() {
                return Err(ConfigError::InvalidTarget(t));
            }
        }

        let mass_penalty = self.mass_penalty.unwrap_or_default();
        if !(mass_penalty.factor.is_finite() && mass_penalty.factor >= 0.0) {
            return Err(ConfigError::InvalidPenaltyFactor(mass_penalty.factor));
        }

        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }
        let solver = SolverConfig {
            executable: self
                .solver_executable
                .ok_or(ConfigError::MissingParameter("solver_executable"))?,
            flag: self
                .solver_flag
                .unwrap_or_else(|| DEFAULT_SOLVER_FLAG.to_string()),
            worker_process: self
                .worker_process
                .unwrap_or_else(|| Some(DEFAULT_WORKER_PROCESS.to_string())),
            poll_interval,
        };

        Ok(OptimizationConfig {
            model_path: self
                .model_path
                .ok_or(ConfigError::MissingParameter("model_path"))?,
            work_dir: self
                .work_dir
                .ok_or(ConfigError::MissingParameter("work_dir"))?,
            selection: self
                .selection
                .ok_or(ConfigError::MissingParameter("selection"))?,
            search,
            response,
            objective,
            mode,
            mass_penalty,
            solver,
        })
    }
}
