use super::surrogate::Surrogate;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

/// Candidate length scales in unit-cube coordinates.
const LENGTH_SCALES: [f64; 6] = [0.05, 0.1, 0.2, 0.4, 0.8, 1.6];
/// Diagonal jitter tried in order until the kernel matrix factorizes.
const JITTERS: [f64; 3] = [1e-6, 1e-4, 1e-2];

/// Gaussian-process regression with a squared-exponential kernel of unit signal variance.
///
/// The length scale is the grid value with the highest log marginal likelihood.
#[derive(Debug, Clone, Default)]
pub struct GaussianProcess {
    fitted: Option<Fitted>,
}

#[derive(Debug, Clone)]
struct Fitted {
    inputs: Vec<Vec<f64>>,
    length_scale: f64,
    noise: f64,
    lower: DMatrix<f64>,
    alpha: DVector<f64>,
}

fn kernel(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let squared: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (-0.5 * squared / (length_scale * length_scale)).exp()
}

impl Fitted {
    fn new(inputs: &[Vec<f64>], targets: &DVector<f64>, length_scale: f64) -> Option<Self> {
        let n = inputs.len();
        let base = DMatrix::from_fn(n, n, |i, j| kernel(&inputs[i], &inputs[j], length_scale));
        JITTERS.iter().find_map(|&noise| {
            let covariance = &base + DMatrix::identity(n, n) * noise;
            let cholesky = covariance.cholesky()?;
            let alpha = cholesky.solve(targets);
            Some(Self {
                inputs: inputs.to_vec(),
                length_scale,
                noise,
                lower: cholesky.l(),
                alpha,
            })
        })
    }

    fn log_marginal_likelihood(&self, targets: &DVector<f64>) -> f64 {
        let n = targets.len() as f64;
        let log_det: f64 = self.lower.diagonal().iter().map(|d| d.ln()).sum();
        -0.5 * targets.dot(&self.alpha) - log_det - 0.5 * n * (2.0 * std::f64::consts::PI).ln()
    }
}

impl Surrogate for GaussianProcess {
    const NAME: &'static str = "GP Minimize";

    fn fit<R: Rng>(&mut self, inputs: &[Vec<f64>], targets: &[f64], _rng: &mut R) {
        let y = DVector::from_column_slice(targets);
        self.fitted = LENGTH_SCALES
            .iter()
            .filter_map(|&scale| Fitted::new(inputs, &y, scale))
            .map(|fitted| (fitted.log_marginal_likelihood(&y), fitted))
            .fold(None, |best: Option<(f64, Fitted)>, (score, fitted)| match best {
                Some((s, _)) if s >= score => best,
                _ => Some((score, fitted)),
            })
            .map(|(_, fitted)| fitted);
    }

    fn predict(&self, point: &[f64]) -> (f64, f64) {
        let Some(fitted) = &self.fitted else {
            return (0.0, 1.0);
        };
        let k_star = DVector::from_iterator(
            fitted.inputs.len(),
            fitted
                .inputs
                .iter()
                .map(|x| kernel(x, point, fitted.length_scale)),
        );
        let mean = k_star.dot(&fitted.alpha);
        let explained = fitted
            .lower
            .solve_lower_triangular(&k_star)
            .map_or(0.0, |v| v.dot(&v));
        let variance = (1.0 + fitted.noise - explained).max(1e-12);
        (mean, variance.sqrt())
    }
}
