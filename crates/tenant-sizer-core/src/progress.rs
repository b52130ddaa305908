use crate::model::{ArchiveSizing, Workload, WorkloadSizing};

/// Trait for reporting sizing progress.
///
/// CLI implements with indicatif; all methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_workload_start(&self, _workload: Workload) {}
    fn on_workload_complete(&self, _workload: Workload, _sizing: &WorkloadSizing, _duration_secs: f64) {}
    fn on_workload_failed(&self, _workload: Workload, _reason: &str) {}
    fn on_archive_start(&self, _total_mailboxes: usize) {}
    fn on_archive_progress(&self, _done: usize, _total: usize) {}
    fn on_archive_complete(&self, _sizing: &ArchiveSizing, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
