//! Black-box search backends.
//!
//! Every backend minimizes an [`Objective`] over a box of bounds. Searches run in the unit
//! hypercube and map points onto the bounds only when they are evaluated, so the surrogate
//! models and the evolution operators never see the physical scale of the parameters.
//!
//! The evaluation counter that names artifacts and fills the history belongs to the
//! objective, not to the backend. A backend's own call count is only an estimate of its
//! nominal budget.

pub mod de;
pub mod gbrt;
pub mod gp;
pub mod surrogate;

use super::config::{SearchConfig, SearchMethod};
use super::error::EngineError;
use rand::Rng;
use rand::seq::SliceRandom;

/// The function a backend minimizes.
///
/// `evaluate` always yields a finite value for a completed trial; failed trials are
/// reported through a sentinel. An `Err` is a run-level abort (cancellation or an internal
/// fault) and must be propagated by the backend unchanged.
pub trait Objective {
    fn dimensions(&self) -> usize;

    fn evaluate(&mut self, point: &[f64]) -> Result<f64, EngineError>;

    /// Number of evaluations performed so far.
    fn evaluations(&self) -> usize;

    fn is_cancelled(&self) -> bool;

    /// Forwards a free-text line to the run's observer.
    fn log(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Best point found, in bound coordinates.
    pub point: Vec<f64>,
    pub value: f64,
    /// Evaluations the backend requested.
    pub evaluations: usize,
}

pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human-readable parameter lines announced before the search starts.
    fn describe(&self, dimensions: usize, budget: usize) -> Vec<String>;

    /// # Errors
    ///
    /// Returns the objective's error as soon as an evaluation fails at run level.
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        bounds: &[(f64, f64)],
        budget: usize,
    ) -> Result<SearchResult, EngineError>;
}

/// Instantiates the backend selected by `config`.
pub fn backend_for(config: &SearchConfig) -> Box<dyn SearchBackend> {
    match config.method {
        SearchMethod::GaussianProcess => {
            Box::new(surrogate::SurrogateSearch::<gp::GaussianProcess>::new(config.seed))
        }
        SearchMethod::BoostedTrees => {
            Box::new(surrogate::SurrogateSearch::<gbrt::BoostedTrees>::new(config.seed))
        }
        SearchMethod::DifferentialEvolution => {
            Box::new(de::DifferentialEvolution::new(config.seed))
        }
    }
}

/// Maps a unit-cube point onto `bounds`.
pub fn to_bounds(unit: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    unit.iter()
        .zip(bounds)
        .map(|(&u, &(low, high))| low + u.clamp(0.0, 1.0) * (high - low))
        .collect()
}

/// Latin hypercube sample of `samples` points in `[0, 1)^dimensions`.
///
/// Each axis is split into `samples` equal strata and every stratum receives exactly one
/// point, placed uniformly at random inside it.
pub fn latin_hypercube<R: Rng + ?Sized>(
    samples: usize,
    dimensions: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let mut points = vec![vec![0.0; dimensions]; samples];
    if samples == 0 {
        return points;
    }
    let width = 1.0 / samples as f64;
    for axis in 0..dimensions {
        let mut strata: Vec<usize> = (0..samples).collect();
        strata.shuffle(rng);
        for (point, stratum) in points.iter_mut().zip(strata) {
            point[axis] = (stratum as f64 + rng.r#gen::<f64>()) * width;
        }
    }
    points
}

/// Index of the smallest value; ties resolve to the earliest entry.
pub(crate) fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Quadratic bowl objective recording every point it receives.
    pub struct Bowl {
        pub center: Vec<f64>,
        pub points: Vec<Vec<f64>>,
        pub cancel_after: Option<usize>,
        pub messages: std::cell::RefCell<Vec<String>>,
    }

    impl Bowl {
        pub fn new(center: Vec<f64>) -> Self {
            Self {
                center,
                points: Vec::new(),
                cancel_after: None,
                messages: Default::default(),
            }
        }
    }

    impl Objective for Bowl {
        fn dimensions(&self) -> usize {
            self.center.len()
        }

        fn evaluate(&mut self, point: &[f64]) -> Result<f64, EngineError> {
            if self.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.points.push(point.to_vec());
            Ok(point
                .iter()
                .zip(&self.center)
                .map(|(x, c)| (x - c).powi(2))
                .sum())
        }

        fn evaluations(&self) -> usize {
            self.points.len()
        }

        fn is_cancelled(&self) -> bool {
            self.cancel_after
                .is_some_and(|limit| self.points.len() >= limit)
        }

        fn log(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    pub fn within(point: &[f64], bounds: &[(f64, f64)]) -> bool {
        point
            .iter()
            .zip(bounds)
            .all(|(&x, &(low, high))| x >= low && x <= high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn latin_hypercube_fills_every_stratum_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = latin_hypercube(10, 3, &mut rng);
        assert_eq!(points.len(), 10);
        for axis in 0..3 {
            let mut strata: Vec<usize> = points
                .iter()
                .map(|p| (p[axis] * 10.0).floor() as usize)
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn unit_points_map_onto_bounds() {
        let bounds = [(0.5, 2.0), (1.0, 3.0)];
        assert_eq!(to_bounds(&[0.0, 1.0], &bounds), vec![0.5, 3.0]);
        assert_eq!(to_bounds(&[0.5, 1.5], &bounds), vec![1.25, 3.0]);
    }

    #[test]
    fn argmin_prefers_first_of_equal_values() {
        assert_eq!(argmin(&[3.0, 1.0, 1.0, 2.0]), Some(1));
        assert_eq!(argmin(&[]), None);
    }

    #[test]
    fn backend_for_selects_by_method() {
        let mut config = SearchConfig {
            method: SearchMethod::DifferentialEvolution,
            budget: 10,
            min_multiplier: 0.5,
            max_multiplier: 2.0,
            seed: 42,
        };
        assert_eq!(backend_for(&config).name(), "Differential Evolution");
        config.method = SearchMethod::GaussianProcess;
        assert_eq!(backend_for(&config).name(), "GP Minimize");
        config.method = SearchMethod::BoostedTrees;
        assert_eq!(backend_for(&config).name(), "GBRT Minimize");
    }
}
