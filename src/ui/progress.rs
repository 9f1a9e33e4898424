//! Progress reporting

use crate::executor::SyncEvent;
use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Spinner driven by pass events.
///
/// Counters reset at the start of every pass. Per-file errors are printed
/// above the spinner so they stay visible after it finishes.
pub struct ProgressReporter {
    bar: ProgressBar,
    created: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(Duration::from_millis(120));
        Self::with_bar(bar)
    }

    /// Reporter that tracks state without drawing anything.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden()))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::with_template("{spinner} {prefix}: {msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        Self {
            bar,
            created: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Update the display for one event.
    pub fn handle(&self, event: &SyncEvent) {
        match event {
            SyncEvent::PassStarted { pass, source, .. } => {
                self.created.store(0, Ordering::Relaxed);
                self.skipped.store(0, Ordering::Relaxed);
                self.errors.store(0, Ordering::Relaxed);
                self.bar.set_prefix(format!("{} {}", pass, source.display()));
                self.bar.set_message("starting...".to_string());
            }
            SyncEvent::ScanStarted { .. } => {
                self.bar.set_message("scanning...".to_string());
            }
            SyncEvent::ScanFinished { matched, .. } => {
                self.bar
                    .println(format!("Scan complete: {} matching files", matched));
                self.refresh();
            }
            SyncEvent::TaskCreated { .. } => {
                self.created.fetch_add(1, Ordering::Relaxed);
                self.refresh();
            }
            SyncEvent::TaskSkipped { .. } => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                self.refresh();
            }
            SyncEvent::TaskFailed { path, error, .. } => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.bar
                    .println(format!("ERROR {}: {}", path.display(), error));
                self.refresh();
            }
            SyncEvent::PassFinished { pass, report } => {
                self.bar.println(format!(
                    "Finished {} pass in {}: {} created, {} up to date, {} errors",
                    pass,
                    HumanDuration(report.elapsed),
                    report.created,
                    report.skipped_existing,
                    report.errors
                ));
            }
            SyncEvent::PassAborted { pass, error } => {
                self.bar
                    .println(format!("Aborted {} pass: {}", pass, error));
            }
            SyncEvent::WorkerStarted { .. } | SyncEvent::WorkerFinished { .. } => {}
        }
    }

    /// Remove the spinner.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn refresh(&self) {
        self.bar.set_message(format!(
            "{} created | {} up to date | {} errors",
            self.created.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed)
        ));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
