use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tenant_sizer_core::model::ArchiveSizing;
use tenant_sizer_core::render::format_bytes;
use tenant_sizer_core::{ProgressReporter, Workload, WorkloadSizing};

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Workload phases: spinner (one report download each)
/// - Archive walk: progress bar (mailbox count known upfront)
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
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars(TICKS),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

impl ProgressReporter for CliReporter {
    fn on_workload_start(&self, workload: Workload) {
        self.set_bar(Self::spinner(format!("Sizing {}...", workload)));
    }

    fn on_workload_complete(&self, workload: Workload, sizing: &WorkloadSizing, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m {}: {} {}, {} total, {}% growth in {:.2}s",
            workload,
            sizing.entity_count,
            workload.entity_noun(),
            format_bytes(sizing.total_bytes),
            sizing.growth_percent,
            duration_secs
        );
    }

    fn on_workload_failed(&self, workload: Workload, reason: &str) {
        self.finish_bar();
        eprintln!("  \x1b[33m!\x1b[0m {} skipped: {}", workload, reason);
    }

    fn on_archive_start(&self, total_mailboxes: usize) {
        let pb = ProgressBar::new(total_mailboxes as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Archives [{bar:30.cyan/dim}] {pos}/{len} mailboxes ({eta} remaining)",
            )
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars(TICKS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_archive_progress(&self, done: usize, _total: usize) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_position(done as u64);
        }
    }

    fn on_archive_complete(&self, sizing: &ArchiveSizing, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Archives: {} measured, {} skipped, {} total in {:.2}s",
            sizing.mailbox_count,
            sizing.skipped,
            format_bytes(sizing.total_bytes),
            duration_secs
        );
    }
}
