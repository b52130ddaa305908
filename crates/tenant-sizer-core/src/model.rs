use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// One of the three sized services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Workload {
    Mail,
    PersonalFiles,
    TeamSites,
}

impl Workload {
    pub const ALL: [Workload; 3] = [Workload::Mail, Workload::PersonalFiles, Workload::TeamSites];

    pub fn display_name(&self) -> &'static str {
        match self {
            Workload::Mail => "Mail",
            Workload::PersonalFiles => "Personal files",
            Workload::TeamSites => "Team sites",
        }
    }

    /// Noun for the unit each workload is measured in.
    pub fn entity_noun(&self) -> &'static str {
        match self {
            Workload::Mail => "mailboxes",
            Workload::PersonalFiles => "users",
            Workload::TeamSites => "sites",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single row of a usage report.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub date: NaiveDate,
    pub entity_id: String,
    pub bytes: u64,
    pub deleted: bool,
    /// Recipient type for mailboxes, site type for sites.
    pub kind: Option<String>,
    pub has_archive: bool,
}

impl UsageSample {
    pub fn new(date: NaiveDate, entity_id: impl Into<String>, bytes: u64) -> Self {
        Self {
            date,
            entity_id: entity_id.into(),
            bytes,
            deleted: false,
            kind: None,
            has_archive: false,
        }
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_archive(mut self, has_archive: bool) -> Self {
        self.has_archive = has_archive;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MailboxBreakdown {
    pub user_mailboxes: u64,
    pub shared_mailboxes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArchiveSizing {
    pub mailbox_count: u64,
    pub total_bytes: u64,
    pub average_bytes: u64,
    pub skipped: u64,
}

/// Sizing results for one workload. Zeroed until its stage succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkloadSizing {
    pub entity_count: u64,
    pub entity_label: String,
    pub total_bytes: u64,
    pub average_bytes: u64,
    pub growth_percent: i64,
    pub one_year_projected_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailboxes: Option<MailboxBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveSizing>,
}

/// The accumulator threaded through every workload stage.
#[derive(Debug, Clone, Serialize)]
pub struct SizingReport {
    pub generated_at: DateTime<Utc>,
    pub period_days: u32,
    pub group: Option<String>,
    pub mail: WorkloadSizing,
    pub personal_files: WorkloadSizing,
    pub team_sites: WorkloadSizing,
    pub total_bytes: u64,
    pub projected_total_bytes: u64,
    pub warnings: Vec<String>,
}

impl SizingReport {
    pub fn new(period_days: u32, group: Option<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            period_days,
            group,
            mail: WorkloadSizing::default(),
            personal_files: WorkloadSizing::default(),
            team_sites: WorkloadSizing::default(),
            total_bytes: 0,
            projected_total_bytes: 0,
            warnings: Vec::new(),
        }
    }

    pub fn workload(&self, workload: Workload) -> &WorkloadSizing {
        match workload {
            Workload::Mail => &self.mail,
            Workload::PersonalFiles => &self.personal_files,
            Workload::TeamSites => &self.team_sites,
        }
    }

    pub fn workload_mut(&mut self, workload: Workload) -> &mut WorkloadSizing {
        match workload {
            Workload::Mail => &mut self.mail,
            Workload::PersonalFiles => &mut self.personal_files,
            Workload::TeamSites => &mut self.team_sites,
        }
    }

    /// Recompute the cross-workload totals from the per-workload figures.
    pub fn finalize(mut self) -> Self {
        self.total_bytes = Workload::ALL
            .iter()
            .fold(0u64, |acc, w| acc.saturating_add(self.workload(*w).total_bytes));
        self.projected_total_bytes = Workload::ALL
            .iter()
            .fold(0u64, |acc, w| {
                acc.saturating_add(self.workload(*w).one_year_projected_bytes)
            });
        self
    }
}
