//! Progress indicators for driftscan CLI.

use driftkit::{Phase, PhaseCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message; hidden when `quiet`.
pub fn spinner(msg: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Clear the spinner line.
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Spinner that follows pipeline phases.
pub struct PhaseSpinner {
    pb: ProgressBar,
}

impl PhaseSpinner {
    pub fn new(env: &str, quiet: bool) -> Self {
        Self {
            pb: spinner(&format!("Scanning {env}"), quiet),
        }
    }

    pub fn finish(&self) {
        finish_clear(&self.pb);
    }
}

impl PhaseCallback for PhaseSpinner {
    fn on_phase(&self, phase: Phase) {
        self.pb.set_message(format!("{}...", phase.description()));
    }
}
