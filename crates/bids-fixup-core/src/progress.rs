/// Trait for reporting session progress.
///
/// The CLI implements it with indicatif spinners. All methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_volumes_start(&self, _total_scans: usize) {}
    fn on_volumes_progress(&self, _done: usize, _total_scans: usize) {}
    fn on_volumes_complete(&self, _annotated: usize, _duration_secs: f64) {}
    fn on_association_start(&self, _fieldmaps: usize, _scans: usize) {}
    fn on_group_assigned(&self, _acq: &str, _run: &str, _fieldmaps: usize, _scans: usize) {}
    fn on_association_complete(&self, _groups: usize, _duration_secs: f64) {}
    fn on_task_names_start(&self) {}
    fn on_task_names_complete(&self, _fixed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
