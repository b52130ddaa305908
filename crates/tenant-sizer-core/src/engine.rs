use crate::archive::{self, ArchiveSession};
use crate::config::AppConfig;
use crate::directory::GroupDirectory;
use crate::error::Error;
use crate::growth::{self, GrowthSeries};
use crate::model::{ArchiveSizing, MailboxBreakdown, SizingReport, UsageSample, Workload, WorkloadSizing};
use crate::progress::ProgressReporter;
use crate::reports::{ReportKind, ReportSource};
use crate::session::{Clock, Connector, SessionManager};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

type ArchiveCollector<'c> = &'c mut dyn FnMut(&[String]) -> Result<ArchiveSizing, Error>;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restrict user-scoped workloads to members of this group.
    pub group: Option<String>,
}

pub struct SizingEngine<'a> {
    config: AppConfig,
    reports: &'a dyn ReportSource,
    groups: Option<&'a dyn GroupDirectory>,
}

/// A workload's figures before they are merged into the report.
struct Measured {
    sizing: WorkloadSizing,
    archive_candidates: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> SizingEngine<'a> {
    pub fn new(config: AppConfig, reports: &'a dyn ReportSource) -> Self {
        Self {
            config,
            reports,
            groups: None,
        }
    }

    pub fn with_group_directory(mut self, groups: &'a dyn GroupDirectory) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Size all three workloads without archive statistics.
    pub fn run(
        &self,
        options: &RunOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<SizingReport, Error> {
        self.run_inner(options, reporter, None)
    }

    /// Size all three workloads and walk mailbox archives through `manager`.
    pub fn run_with_archives<C, K>(
        &self,
        options: &RunOptions,
        manager: &mut SessionManager<C, K>,
        reporter: &dyn ProgressReporter,
    ) -> Result<SizingReport, Error>
    where
        C: Connector,
        C::Session: ArchiveSession,
        K: Clock,
    {
        let mut collect =
            |mailboxes: &[String]| archive::collect_archive_sizing(&mut *manager, mailboxes, reporter);
        self.run_inner(options, reporter, Some(&mut collect))
    }

    fn run_inner(
        &self,
        options: &RunOptions,
        reporter: &dyn ProgressReporter,
        archives: Option<ArchiveCollector<'_>>,
    ) -> Result<SizingReport, Error> {
        let scope = self.resolve_scope(options.group.as_deref())?;
        let report = SizingReport::new(self.config.period_days, options.group.clone());

        info!("Sizing mail...");
        let report = self.stage(report, Workload::Mail, scope.as_ref(), archives, reporter)?;
        info!("Sizing personal files...");
        let report = self.stage(report, Workload::PersonalFiles, scope.as_ref(), None, reporter)?;
        // Sites are not owned by group members, so the scope does not apply.
        info!("Sizing team sites...");
        let report = self.stage(report, Workload::TeamSites, None, None, reporter)?;

        let report = report.finalize();
        info!(
            "Total {} bytes, projected {} bytes in one year",
            report.total_bytes, report.projected_total_bytes
        );
        Ok(report)
    }

    fn resolve_scope(&self, group: Option<&str>) -> Result<Option<HashSet<String>>, Error> {
        let Some(group) = group else {
            return Ok(None);
        };
        let directory = self
            .groups
            .ok_or_else(|| Error::GroupNotFound(group.to_string()))?;
        let members = directory.members(group)?;
        if members.is_empty() {
            return Err(Error::EmptyGroup(group.to_string()));
        }
        info!("Scoping to {} members of group '{}'", members.len(), group);
        Ok(Some(members))
    }

    /// Measure one workload and merge it into `report`. Workload failures are
    /// recorded as warnings; only fatal errors are returned.
    fn stage(
        &self,
        mut report: SizingReport,
        workload: Workload,
        scope: Option<&HashSet<String>>,
        archives: Option<ArchiveCollector<'_>>,
        reporter: &dyn ProgressReporter,
    ) -> Result<SizingReport, Error> {
        reporter.on_workload_start(workload);
        let start = Instant::now();

        let measured = match self.measure(workload, scope) {
            Ok(measured) => measured,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("{} skipped: {}", workload, err);
                let reason = err.to_string();
                report.warnings.push(format!("{}: {}", workload, reason));
                reporter.on_workload_failed(workload, &reason);
                return Ok(report);
            }
        };

        let Measured {
            mut sizing,
            archive_candidates,
            warnings,
        } = measured;
        report.warnings.extend(warnings);

        if let Some(collect) = archives {
            info!("Collecting {} archive statistics...", archive_candidates.len());
            match collect(&archive_candidates) {
                Ok(archive) => sizing.archive = Some(archive),
                Err(err) => {
                    warn!("Archive statistics abandoned: {}", err);
                    report
                        .warnings
                        .push(format!("{} archives: {}", workload, err));
                }
            }
        }

        reporter.on_workload_complete(workload, &sizing, start.elapsed().as_secs_f64());
        *report.workload_mut(workload) = sizing;
        Ok(report)
    }

    fn measure(
        &self,
        workload: Workload,
        scope: Option<&HashSet<String>>,
    ) -> Result<Measured, Error> {
        let period = self.config.period_days;
        let detail = self.reports.fetch(ReportKind::detail(workload), period)?;

        let entities: Vec<&UsageSample> = detail
            .iter()
            .filter(|s| !s.deleted)
            .filter(|s| scope.map_or(true, |members| members.contains(&s.entity_id.to_lowercase())))
            .collect();
        let total_bytes = entities.iter().fold(0u64, |acc, s| acc.saturating_add(s.bytes));
        debug!(
            "{}: {} of {} rows in scope, {} bytes",
            workload,
            entities.len(),
            detail.len(),
            total_bytes
        );

        let (entity_count, entity_label, mailboxes) = match workload {
            Workload::Mail => {
                let breakdown = mailbox_breakdown(&entities);
                let (count, label) = primary_mailbox_count(&breakdown);
                (count, label.to_string(), Some(breakdown))
            }
            Workload::PersonalFiles => (entities.len() as u64, "Users".to_string(), None),
            Workload::TeamSites => (entities.len() as u64, "Sites".to_string(), None),
        };

        let mut warnings = Vec::new();
        let growth_percent = match self.reports.fetch(ReportKind::storage(workload), period) {
            Ok(history) => {
                let series = GrowthSeries::from_samples(&history);
                growth::estimate_growth(&series.daily_totals(), self.config.default_growth_percent)
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("{} storage history unavailable: {}", workload, err);
                warnings.push(format!(
                    "{}: storage history unavailable, assuming {}% growth",
                    workload, self.config.default_growth_percent
                ));
                self.config.default_growth_percent
            }
        };

        let average_bytes = match entities.len() as u64 {
            0 => 0,
            n => total_bytes / n,
        };

        let archive_candidates = if workload == Workload::Mail {
            entities
                .iter()
                .filter(|s| s.has_archive)
                .map(|s| s.entity_id.clone())
                .collect()
        } else {
            Vec::new()
        };

        Ok(Measured {
            sizing: WorkloadSizing {
                entity_count,
                entity_label,
                total_bytes,
                average_bytes,
                growth_percent,
                one_year_projected_bytes: growth::project(total_bytes, growth_percent),
                mailboxes,
                archive: None,
            },
            archive_candidates,
            warnings,
        })
    }
}

/// Count user and shared mailboxes. Rows without a recipient type count as
/// user mailboxes.
fn mailbox_breakdown(entities: &[&UsageSample]) -> MailboxBreakdown {
    let mut breakdown = MailboxBreakdown::default();
    for sample in entities {
        match sample.kind.as_deref() {
            Some(kind) if kind.eq_ignore_ascii_case("shared") => breakdown.shared_mailboxes += 1,
            Some(kind) if kind.eq_ignore_ascii_case("user") => breakdown.user_mailboxes += 1,
            None => breakdown.user_mailboxes += 1,
            Some(_) => {}
        }
    }
    breakdown
}

/// The larger of the user and shared populations, with its label. Ties go to
/// user mailboxes.
pub fn primary_mailbox_count(breakdown: &MailboxBreakdown) -> (u64, &'static str) {
    if breakdown.shared_mailboxes > breakdown.user_mailboxes {
        (breakdown.shared_mailboxes, "Shared mailboxes")
    } else {
        (breakdown.user_mailboxes, "User mailboxes")
    }
}
