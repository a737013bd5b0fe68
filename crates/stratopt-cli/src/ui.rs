use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use stratopt::engine::progress::{Progress, ProgressCallback, TrialProgress};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    base_message: String,
    initial_mass: Option<f64>,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        // Drain whatever the worker sent before shutdown was requested.
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        self.clear_active_bar();
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.clear_active_bar();

                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb.set_style(Self::spinner_style());
                pb.set_message(name.to_string());

                self.state.active_bar = Some(pb);
                self.state.base_message = name.to_string();
            }
            Progress::PhaseFinish => {
                self.clear_active_bar();

                let final_message = format!("✓ {}", self.state.base_message);
                self.mp.println(final_message).ok();

                self.state.base_message.clear();
            }
            Progress::TaskStart { total_steps } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.set_style(Self::bar_style());
                    bar.set_length(total_steps);
                    bar.set_position(0);
                    bar.disable_steady_tick();
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.finish();
                }
            }
            Progress::Message(msg) => {
                self.mp.println(format!("  {}", msg)).ok();
            }
            Progress::InitialMass(mass) => {
                self.state.initial_mass = Some(mass);
            }
            Progress::Trial(trial) => self.handle_trial(&trial),
            Progress::Finished { success, message } => {
                self.clear_active_bar();
                let marker = if success { "✓" } else { "✗" };
                self.mp.println(format!("{marker} {message}")).ok();
            }
        }
    }

    fn handle_trial(&mut self, trial: &TrialProgress) {
        self.mp.println(format!("  {trial}")).ok();

        let Some(bar) = self.state.active_bar.as_ref() else {
            return;
        };
        let position = trial.iteration as u64;
        // Differential evolution finishes its generation past the nominal budget.
        if bar.length().is_some_and(|len| position > len) {
            bar.set_length(position);
        }
        bar.set_position(position);

        let best = trial
            .best
            .map_or_else(|| "-".to_string(), |b| format!("{b:.5}"));
        let mass = match (trial.mass, self.state.initial_mass) {
            (Some(m), Some(_)) => trial
                .mass_change_percent
                .map_or_else(|| format!(", mass {m:.2}"), |c| format!(", mass {c:+.2}%")),
            (Some(m), None) => format!(", mass {m:.2}"),
            _ => String::new(),
        };
        bar.set_message(format!("{} (best {best}{mass})", self.state.base_message));
    }

    fn clear_active_bar(&mut self) {
        if let Some(bar) = self.state.active_bar.take() {
            bar.finish_and_clear();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<45} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Invalid template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("━╸ ")
    }
}

pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
    forwarders: Vec<JoinHandle<()>>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            sender,
            forwarders: Vec::new(),
        }
    }

    /// Builds the engine callback for the worker thread.
    ///
    /// The callback only pushes onto an unbounded queue, so the worker never waits on the
    /// UI. A task on the current Tokio runtime moves queued events into the bounded UI
    /// channel in order, waiting for room instead of dropping anything.
    pub fn get_callback(&mut self) -> ProgressCallback<'static> {
        let (queue, mut pending) = mpsc::unbounded_channel::<Progress>();
        let sender = self.sender.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(progress) = pending.recv().await {
                if sender.send(UiEvent::Progress(progress)).await.is_err() {
                    break;
                }
            }
        }));
        Box::new(move |progress: Progress| {
            if let Err(e) = queue.send(progress) {
                warn!("Failed to queue progress update for UI: {}", e);
            }
        })
    }

    /// Waits until every queued event has reached the UI channel.
    ///
    /// Completes once all callbacks built by this handler have been dropped.
    pub async fn flush(self) {
        for forwarder in self.forwarders {
            if let Err(e) = forwarder.await {
                warn!("Progress forwarder task failed: {}", e);
            }
        }
    }
}
