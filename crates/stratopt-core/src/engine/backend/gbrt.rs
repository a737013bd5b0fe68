use super::surrogate::Surrogate;
use rand::Rng;

const ENSEMBLE_SIZE: usize = 10;
const BOOSTING_ROUNDS: usize = 40;
const LEARNING_RATE: f64 = 0.1;
const MAX_DEPTH: usize = 3;
const MIN_SAMPLES_LEAF: usize = 1;

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, point: &[f64]) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if point[*feature] <= *threshold {
                    left.predict(point)
                } else {
                    right.predict(point)
                }
            }
        }
    }
}

fn mean_of(targets: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| targets[r]).sum::<f64>() / rows.len() as f64
}

/// Grows a least-squares regression tree over `rows`.
fn grow(inputs: &[Vec<f64>], targets: &[f64], rows: &[usize], depth: usize) -> Node {
    if depth == 0 || rows.len() < 2 * MIN_SAMPLES_LEAF {
        return Node::Leaf(mean_of(targets, rows));
    }
    let Some((feature, threshold)) = best_split(inputs, targets, rows) else {
        return Node::Leaf(mean_of(targets, rows));
    };
    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&r| inputs[r][feature] <= threshold);
    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(inputs, targets, &left, depth - 1)),
        right: Box::new(grow(inputs, targets, &right, depth - 1)),
    }
}

/// Split maximizing the reduction in squared error, or `None` if no split reduces it.
fn best_split(inputs: &[Vec<f64>], targets: &[f64], rows: &[usize]) -> Option<(usize, f64)> {
    let dimensions = inputs.first().map_or(0, Vec::len);
    let total: f64 = rows.iter().map(|&r| targets[r]).sum();
    let n = rows.len() as f64;
    let parent_score = total * total / n;

    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..dimensions {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|&a, &b| inputs[a][feature].total_cmp(&inputs[b][feature]));

        let mut left_sum = 0.0;
        for split in 1..sorted.len() {
            left_sum += targets[sorted[split - 1]];
            let (lo, hi) = (inputs[sorted[split - 1]][feature], inputs[sorted[split]][feature]);
            if lo == hi || split < MIN_SAMPLES_LEAF || sorted.len() - split < MIN_SAMPLES_LEAF {
                continue;
            }
            let left_n = split as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n + right_sum * right_sum / (n - left_n);
            if score > parent_score + 1e-12 && best.is_none_or(|(s, _, _)| score > s) {
                best = Some((score, feature, 0.5 * (lo + hi)));
            }
        }
    }
    best.map(|(_, feature, threshold)| (feature, threshold))
}

#[derive(Debug, Clone)]
struct BoostedModel {
    base: f64,
    trees: Vec<Node>,
}

impl BoostedModel {
    fn fit(inputs: &[Vec<f64>], targets: &[f64], rows: &[usize]) -> Self {
        let base = mean_of(targets, rows);
        let mut prediction = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(BOOSTING_ROUNDS);
        for _ in 0..BOOSTING_ROUNDS {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&prediction)
                .map(|(t, p)| t - p)
                .collect();
            let tree = grow(inputs, &residuals, rows, MAX_DEPTH);
            for (input, p) in inputs.iter().zip(prediction.iter_mut()) {
                *p += LEARNING_RATE * tree.predict(input);
            }
            trees.push(tree);
        }
        Self { base, trees }
    }

    fn predict(&self, point: &[f64]) -> f64 {
        self.base
            + LEARNING_RATE * self.trees.iter().map(|t| t.predict(point)).sum::<f64>()
    }
}

/// Bagged ensemble of gradient-boosted regression trees.
///
/// Each member is boosted on a bootstrap resample; the spread of the members' predictions
/// serves as the uncertainty estimate.
#[derive(Debug, Clone, Default)]
pub struct BoostedTrees {
    members: Vec<BoostedModel>,
}

impl Surrogate for BoostedTrees {
    const NAME: &'static str = "GBRT Minimize";

    fn fit<R: Rng>(&mut self, inputs: &[Vec<f64>], targets: &[f64], rng: &mut R) {
        let n = inputs.len();
        self.members.clear();
        if n == 0 {
            return;
        }
        for _ in 0..ENSEMBLE_SIZE {
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            self.members.push(BoostedModel::fit(inputs, targets, &rows));
        }
    }

    fn predict(&self, point: &[f64]) -> (f64, f64) {
        if self.members.is_empty() {
            return (0.0, 1.0);
        }
        let predictions: Vec<f64> = self.members.iter().map(|m| m.predict(point)).collect();
        let n = predictions.len() as f64;
        let mean = predictions.iter().sum::<f64>() / n;
        let variance = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }
}
