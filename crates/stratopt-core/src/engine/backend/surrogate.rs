use super::{Objective, SearchBackend, SearchResult, argmin, latin_hypercube, to_bounds};
use crate::engine::error::EngineError;
use crate::engine::objective::SENTINEL_OBJECTIVE;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;
use tracing::debug;

/// Random candidates scored by the acquisition function per proposal.
const RANDOM_CANDIDATES: usize = 2000;
/// Candidates drawn around the incumbent per proposal.
const LOCAL_CANDIDATES: usize = 200;
/// Half-width of the incumbent neighbourhood, as a fraction of each axis.
const LOCAL_RADIUS: f64 = 0.1;
/// Exploration margin of expected improvement, in standardized target units.
const XI: f64 = 0.01;

/// A regression model that predicts a mean and an uncertainty for unit-cube points.
pub trait Surrogate: Default {
    const NAME: &'static str;

    /// Fits the model to standardized targets.
    fn fit<R: Rng>(&mut self, inputs: &[Vec<f64>], targets: &[f64], rng: &mut R);

    /// Returns `(mean, standard deviation)` at `point`.
    fn predict(&self, point: &[f64]) -> (f64, f64);
}

/// Initial space-filling evaluations before the model takes over.
pub fn initial_points(budget: usize) -> usize {
    (budget / 3).clamp(3, 5)
}

/// Sequential model-based search: a Latin-hypercube design, then one evaluation per step at
/// the candidate with the highest expected improvement.
pub struct SurrogateSearch<S> {
    seed: u64,
    _model: PhantomData<fn() -> S>,
}

impl<S: Surrogate> SurrogateSearch<S> {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            _model: PhantomData,
        }
    }
}

impl<S: Surrogate> SearchBackend for SurrogateSearch<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn describe(&self, _dimensions: usize, budget: usize) -> Vec<String> {
        vec![format!(
            "{}: n_calls={}, n_initial={}",
            S::NAME,
            budget,
            initial_points(budget)
        )]
    }

    fn minimize(
        &self,
        objective: &mut dyn Objective,
        bounds: &[(f64, f64)],
        budget: usize,
    ) -> Result<SearchResult, EngineError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let dimensions = bounds.len();

        let mut inputs = latin_hypercube(initial_points(budget).min(budget), dimensions, &mut rng);
        let mut values = Vec::with_capacity(budget);
        for point in &inputs {
            values.push(objective.evaluate(&to_bounds(point, bounds))?);
        }

        while values.len() < budget {
            let targets = standardize(&values);
            let mut model = S::default();
            model.fit(&inputs, &targets, &mut rng);

            let incumbent = argmin(&targets)
                .map(|i| inputs[i].clone())
                .unwrap_or_else(|| vec![0.5; dimensions]);
            let best_target = targets.iter().copied().fold(f64::INFINITY, f64::min);
            let next = propose(&model, &incumbent, best_target, &mut rng);
            debug!(evaluation = values.len() + 1, "{} proposal", S::NAME);

            values.push(objective.evaluate(&to_bounds(&next, bounds))?);
            inputs.push(next);
        }

        let best = argmin(&values)
            .ok_or_else(|| EngineError::Internal("surrogate search made no evaluations".into()))?;
        Ok(SearchResult {
            point: to_bounds(&inputs[best], bounds),
            value: values[best],
            evaluations: values.len(),
        })
    }
}

/// Standardizes observed values for fitting.
///
/// Failed trials carry the sentinel, which would flatten every other difference; they are
/// fitted at the worst successful value instead.
fn standardize(values: &[f64]) -> Vec<f64> {
    let worst = values
        .iter()
        .copied()
        .filter(|&v| v < SENTINEL_OBJECTIVE)
        .fold(f64::NEG_INFINITY, f64::max);
    let clipped: Vec<f64> = values
        .iter()
        .map(|&v| {
            if v < SENTINEL_OBJECTIVE {
                v
            } else if worst.is_finite() {
                worst
            } else {
                0.0
            }
        })
        .collect();

    let n = clipped.len().max(1) as f64;
    let mean = clipped.iter().sum::<f64>() / n;
    let variance = clipped.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let scale = if variance > 0.0 { variance.sqrt() } else { 1.0 };
    clipped.iter().map(|v| (v - mean) / scale).collect()
}

fn propose<S: Surrogate, R: Rng>(
    model: &S,
    incumbent: &[f64],
    best_target: f64,
    rng: &mut R,
) -> Vec<f64> {
    let dimensions = incumbent.len();
    let random = (0..RANDOM_CANDIDATES).map(|_| {
        (0..dimensions)
            .map(|_| rng.r#gen::<f64>())
            .collect::<Vec<f64>>()
    });
    let mut candidates: Vec<Vec<f64>> = random.collect();
    for _ in 0..LOCAL_CANDIDATES {
        candidates.push(
            incumbent
                .iter()
                .map(|&x| (x + rng.gen_range(-LOCAL_RADIUS..LOCAL_RADIUS)).clamp(0.0, 1.0))
                .collect(),
        );
    }

    let mut best: Option<(f64, Vec<f64>)> = None;
    for candidate in candidates {
        let (mean, std) = model.predict(&candidate);
        let score = expected_improvement(mean, std, best_target);
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, point)| point)
        .unwrap_or_else(|| incumbent.to_vec())
}

/// Expected improvement below `best` for a minimization problem.
pub fn expected_improvement(mean: f64, std: f64, best: f64) -> f64 {
    let gain = best - mean - XI;
    if std <= 1e-12 {
        return gain.max(0.0);
    }
    let z = gain / std;
    gain * normal_cdf(z) + std * normal_pdf(z)
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    const A: [f64; 5] = [
        0.254829592,
        -0.284496736,
        1.421413741,
        -1.453152027,
        1.061405429,
    ];
    const P: f64 = 0.3275911;
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, &a| acc * t + a) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
