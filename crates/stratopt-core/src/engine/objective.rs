//! Pure objective composition: mode transform, mass penalty, and the best-result comparator.

use super::config::Mode;

/// Objective substituted for a failed trial.
pub const SENTINEL_OBJECTIVE: f64 = 1e10;

/// Maps a raw result onto the value the search backend minimizes.
pub fn transform(raw: f64, mode: Mode) -> f64 {
    match mode {
        Mode::Minimize => raw,
        Mode::Maximize => -raw,
        Mode::Target(target) => (raw - target).abs(),
    }
}

/// Relative mass change against the baseline; `None` for a zero or non-finite baseline.
pub fn mass_change(current: f64, initial: f64) -> Option<f64> {
    if initial == 0.0 || !initial.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - initial) / initial)
}

/// Scales a transformed objective by the mass penalty.
///
/// Mass reduction never rewards: a non-positive change leaves `value` untouched. For
/// `Maximize` the factor divides, for the other modes it multiplies.
pub fn apply_mass_penalty(value: f64, mode: Mode, change: f64, factor: f64) -> f64 {
    if change <= 0.0 {
        return value;
    }
    let scale = 1.0 + factor * change;
    match mode {
        Mode::Maximize => value / scale,
        Mode::Minimize | Mode::Target(_) => value * scale,
    }
}

impl Mode {
    /// Whether `candidate` strictly improves on `incumbent` under this mode.
    ///
    /// Compares raw, untransformed results. Any finite candidate beats an empty incumbent.
    pub fn is_better(&self, candidate: f64, incumbent: Option<f64>) -> bool {
        let Some(incumbent) = incumbent else {
            return candidate.is_finite();
        };
        match *self {
            Mode::Minimize => candidate < incumbent,
            Mode::Maximize => candidate > incumbent,
            Mode::Target(target) => (candidate - target).abs() < (incumbent - target).abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn transform_per_mode() {
        assert_eq!(transform(2.0, Mode::Minimize), 2.0);
        assert_eq!(transform(2.0, Mode::Maximize), -2.0);
        assert_eq!(transform(0.5, Mode::Target(1.0)), 0.5);
        assert_eq!(transform(1.5, Mode::Target(1.0)), 0.5);
    }

    #[test]
    fn ten_percent_mass_growth_scales_minimize_objective() {
        let change = mass_change(110.0, 100.0).unwrap();
        let penalized = apply_mass_penalty(transform(2.0, Mode::Minimize), Mode::Minimize, change, 1.0);
        assert!((penalized - 2.2).abs() < TOLERANCE);
    }

    #[test]
    fn maximize_divides_by_the_penalty_factor() {
        let penalized = apply_mass_penalty(-2.0, Mode::Maximize, 0.1, 1.0);
        assert!((penalized - (-2.0 / 1.1)).abs() < TOLERANCE);
    }

    #[test]
    fn mass_reduction_is_a_no_op() {
        for mode in [Mode::Minimize, Mode::Maximize, Mode::Target(3.0)] {
            assert_eq!(apply_mass_penalty(5.0, mode, -0.2, 4.0), 5.0);
            assert_eq!(apply_mass_penalty(5.0, mode, 0.0, 4.0), 5.0);
        }
    }

    #[test]
    fn penalty_is_deterministic() {
        let a = apply_mass_penalty(transform(3.3, Mode::Target(1.0)), Mode::Target(1.0), 0.25, 2.0);
        let b = apply_mass_penalty(transform(3.3, Mode::Target(1.0)), Mode::Target(1.0), 0.25, 2.0);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn mass_change_requires_a_usable_baseline() {
        assert_eq!(mass_change(1.0, 0.0), None);
        assert_eq!(mass_change(f64::NAN, 1.0), None);
        assert!((mass_change(90.0, 100.0).unwrap() + 0.1).abs() < TOLERANCE);
    }

    #[test]
    fn comparator_per_mode() {
        assert!(Mode::Minimize.is_better(1.0, None));
        assert!(Mode::Minimize.is_better(1.0, Some(2.0)));
        assert!(!Mode::Minimize.is_better(2.0, Some(2.0)));
        assert!(Mode::Maximize.is_better(3.0, Some(2.0)));
        assert!(!Mode::Maximize.is_better(1.0, Some(2.0)));
        assert!(Mode::Target(1.0).is_better(1.2, Some(0.5)));
        assert!(!Mode::Target(1.0).is_better(0.5, Some(1.2)));
    }
}
