use bids_fixup_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif.
///
/// - Volume pass: progress bar (functional scan count known upfront)
/// - Field map and task name passes: spinner
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn spinner(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICKS));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl ProgressReporter for CliReporter {
    fn on_volumes_start(&self, total_scans: usize) {
        let pb = ProgressBar::new(total_scans as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Volume counts [{bar:30.cyan/dim}] {pos}/{len} scans",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICKS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_volumes_progress(&self, done: usize, _total_scans: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(done as u64);
            }
        }
    }

    fn on_volumes_complete(&self, annotated: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Volume counts: {} sidecars updated in {:.2}s",
            annotated, duration_secs
        );
    }

    fn on_association_start(&self, fieldmaps: usize, scans: usize) {
        self.spinner(&format!(
            "Matching {} field maps against {} scans...",
            fieldmaps, scans
        ));
    }

    fn on_group_assigned(&self, acq: &str, run: &str, fieldmaps: usize, scans: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(format!(
                    "acq-{} run-{}: {} field maps -> {} scans",
                    acq, run, fieldmaps, scans
                ));
            }
        }
    }

    fn on_association_complete(&self, groups: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Field maps: {} groups assigned in {:.2}s",
            groups, duration_secs
        );
    }

    fn on_task_names_start(&self) {
        self.spinner("Checking task names...");
    }

    fn on_task_names_complete(&self, fixed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Task names: {} placeholders fixed in {:.2}s",
            fixed, duration_secs
        );
    }
}
