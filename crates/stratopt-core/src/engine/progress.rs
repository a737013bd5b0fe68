use std::fmt;

/// One completed trial, as seen by an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialProgress {
    pub iteration: usize,
    /// Nominal evaluation budget, for percentage displays.
    pub budget: usize,
    pub raw: f64,
    /// Best raw result so far; absent until a trial has succeeded.
    pub best: Option<f64>,
    pub mass: Option<f64>,
    pub mass_change_percent: Option<f64>,
    pub is_new_best: bool,
    pub failed: bool,
}

impl TrialProgress {
    /// Completion against the budget, capped at 100.
    pub fn percent(&self) -> f64 {
        if self.budget == 0 {
            return 100.0;
        }
        (self.iteration as f64 / self.budget as f64 * 100.0).min(100.0)
    }
}

impl fmt::Display for TrialProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] Result: {:.5}",
            self.iteration, self.budget, self.raw
        )?;
        match self.best {
            Some(best) => write!(f, " | Best: {best:.5}")?,
            None => write!(f, " | Best: -")?,
        }
        if let Some(mass) = self.mass {
            write!(f, " | Mass: {mass:.5}")?;
            if let Some(change) = self.mass_change_percent {
                write!(f, " ({change:+.2}%)")?;
            }
        }
        if self.is_new_best {
            write!(f, " ★")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskFinish,

    Message(String),

    /// Baseline mass of the unmutated model.
    InitialMass(f64),
    Trial(TrialProgress),
    /// The single terminal notification of a run.
    Finished { success: bool, message: String },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        self.report(Progress::Message(text.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn trial() -> TrialProgress {
        TrialProgress {
            iteration: 3,
            budget: 10,
            raw: 1.234567,
            best: Some(1.0),
            mass: Some(110.0),
            mass_change_percent: Some(10.0),
            is_new_best: true,
            failed: false,
        }
    }

    #[test]
    fn trial_line_matches_log_format() {
        assert_eq!(
            trial().to_string(),
            "[3/10] Result: 1.23457 | Best: 1.00000 | Mass: 110.00000 (+10.00%) ★"
        );
    }

    #[test]
    fn trial_line_without_mass_or_best() {
        let progress = TrialProgress {
            best: None,
            mass: None,
            mass_change_percent: None,
            is_new_best: false,
            ..trial()
        };
        assert_eq!(progress.to_string(), "[3/10] Result: 1.23457 | Best: -");
    }

    #[test]
    fn percent_is_capped() {
        let progress = TrialProgress {
            iteration: 25,
            ..trial()
        };
        assert_eq!(progress.percent(), 100.0);
        assert_eq!(trial().percent(), 30.0);
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if let Progress::Message(text) = event {
                sink.lock().unwrap().push(text);
            }
        }));
        reporter.message("hello");
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
        ProgressReporter::new().message("dropped");
    }
}
