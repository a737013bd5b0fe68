use stratopt::engine::config::{
    Component, DEFAULT_POLL_INTERVAL, DEFAULT_SEED, DEFAULT_SOLVER_FLAG, DEFAULT_WORKER_PROCESS,
    ResponseKind, SearchMethod,
};

pub struct DefaultsConfig {
    pub property_selection: String,
    pub method: SearchMethod,
    pub budget: usize,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub seed: u64,
    pub result_kind: ResponseKind,
    pub component: Component,
    pub mass_penalty_enabled: bool,
    pub mass_penalty_factor: f64,
    pub solver_flag: String,
    pub worker_process: String,
    pub poll_interval_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            property_selection: "all".to_string(),
            method: SearchMethod::GaussianProcess,
            budget: 30,
            min_multiplier: 0.1,
            max_multiplier: 5.0,
            seed: DEFAULT_SEED,
            result_kind: ResponseKind::Displacement,
            component: Component::XYZ,
            mass_penalty_enabled: false,
            mass_penalty_factor: 1.0,
            solver_flag: DEFAULT_SOLVER_FLAG.to_string(),
            worker_process: DEFAULT_WORKER_PROCESS.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Sum of every response variable, `w1 + w2 + ... + wN`.
pub fn default_objective(responses: usize) -> String {
    (1..=responses.max(1))
        .map(|i| format!("w{i}"))
        .collect::<Vec<_>>()
        .join(" + ")
}
