use super::{Objective, SearchBackend, SearchResult, argmin, latin_hypercube, to_bounds};
use crate::engine::error::EngineError;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::debug;

const MUTATION: (f64, f64) = (0.5, 1.0);
const RECOMBINATION: f64 = 0.7;
const ABSOLUTE_TOLERANCE: f64 = 0.001;
const RELATIVE_TOLERANCE: f64 = 0.01;
const MAX_GENERATIONS: usize = 1000;

/// Population multiplier: the population holds this many members per parameter.
pub fn population_size(dimensions: usize) -> usize {
    if dimensions > 50 { 5 } else { 15 }
}

/// Generation limit derived from the evaluation budget.
pub fn max_generations(budget: usize, dimensions: usize) -> usize {
    let per_generation = (population_size(dimensions) * dimensions).max(1);
    (budget / per_generation).clamp(2, MAX_GENERATIONS)
}

/// `best1bin` differential evolution with dithered mutation and immediate updating.
///
/// After every generation the search stops early once the objective reports cancellation
/// or has reached the evaluation budget, so a generation in flight always completes.
pub struct DifferentialEvolution {
    seed: u64,
}

impl DifferentialEvolution {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl SearchBackend for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "Differential Evolution"
    }

    fn describe(&self, dimensions: usize, budget: usize) -> Vec<String> {
        let popsize = population_size(dimensions);
        let maxiter = max_generations(budget, dimensions);
        vec![
            format!("Differential Evolution: popsize={popsize}, maxiter={maxiter}"),
            format!(
                "Estimated function calls: {} (target: {budget})",
                popsize * maxiter * dimensions
            ),
        ]
    }

    fn minimize(
        &self,
        objective: &mut dyn Objective,
        bounds: &[(f64, f64)],
        budget: usize,
    ) -> Result<SearchResult, EngineError> {
        let dimensions = bounds.len();
        let members = population_size(dimensions) * dimensions;
        if members < 3 {
            return Err(EngineError::Internal(format!(
                "differential evolution needs at least 3 members, got {members}"
            )));
        }
        let generations = max_generations(budget, dimensions);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut population = latin_hypercube(members, dimensions, &mut rng);
        let mut energies = Vec::with_capacity(members);
        for member in &population {
            energies.push(objective.evaluate(&to_bounds(member, bounds))?);
        }
        let mut evaluations = members;
        let mut best = argmin(&energies).unwrap_or(0);

        for generation in 1..=generations {
            let scale = rng.gen_range(MUTATION.0..MUTATION.1);
            for i in 0..members {
                let trial = {
                    let mutant = mutant_best1(i, best, &population, scale, &mut rng);
                    let mut trial = binomial_crossover(&population[i], &mutant, &mut rng);
                    for x in trial.iter_mut().filter(|x| !(0.0..=1.0).contains(*x)) {
                        *x = rng.r#gen::<f64>();
                    }
                    trial
                };

                let energy = objective.evaluate(&to_bounds(&trial, bounds))?;
                evaluations += 1;
                if energy <= energies[i] {
                    population[i] = trial;
                    energies[i] = energy;
                    if energy < energies[best] {
                        best = i;
                    }
                }
            }

            let (mean, std) = mean_std(&energies);
            debug!(generation, best = energies[best], mean, std, "DE generation");

            if objective.is_cancelled() {
                objective.log("Stopping: optimization halted by user");
                break;
            }
            if objective.evaluations() >= budget {
                objective.log(&format!("Stopping: reached target of {budget} evaluations"));
                break;
            }
            if std <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * mean.abs() {
                debug!(generation, "DE converged");
                break;
            }
        }

        Ok(SearchResult {
            point: to_bounds(&population[best], bounds),
            value: energies[best],
            evaluations,
        })
    }
}

fn mutant_best1<R: Rng>(
    i: usize,
    best: usize,
    population: &[Vec<f64>],
    scale: f64,
    rng: &mut R,
) -> Vec<f64> {
    let (r0, r1) = loop {
        let picked = index::sample(rng, population.len(), 2);
        let (a, b) = (picked.index(0), picked.index(1));
        if a != i && b != i {
            break (a, b);
        }
    };
    population[best]
        .iter()
        .zip(&population[r0])
        .zip(&population[r1])
        .map(|((b, x0), x1)| b + scale * (x0 - x1))
        .collect()
}

fn binomial_crossover<R: Rng>(target: &[f64], mutant: &[f64], rng: &mut R) -> Vec<f64> {
    let forced = rng.gen_range(0..target.len());
    target
        .iter()
        .zip(mutant)
        .enumerate()
        .map(|(j, (&t, &m))| {
            if j == forced || rng.r#gen::<f64>() < RECOMBINATION {
                m
            } else {
                t
            }
        })
        .collect()
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
