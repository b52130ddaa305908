use crate::error::Error;
use crate::model::{UsageSample, Workload};
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// The usage reports consumed per workload: a per-entity detail snapshot and a
/// daily storage history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    MailboxDetail,
    MailboxStorage,
    PersonalFilesDetail,
    PersonalFilesStorage,
    SiteDetail,
    SiteStorage,
}

impl ReportKind {
    pub fn detail(workload: Workload) -> Self {
        match workload {
            Workload::Mail => ReportKind::MailboxDetail,
            Workload::PersonalFiles => ReportKind::PersonalFilesDetail,
            Workload::TeamSites => ReportKind::SiteDetail,
        }
    }

    pub fn storage(workload: Workload) -> Self {
        match workload {
            Workload::Mail => ReportKind::MailboxStorage,
            Workload::PersonalFiles => ReportKind::PersonalFilesStorage,
            Workload::TeamSites => ReportKind::SiteStorage,
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            ReportKind::MailboxDetail => "MailboxUsageDetail",
            ReportKind::MailboxStorage => "MailboxUsageStorage",
            ReportKind::PersonalFilesDetail => "OneDriveUsageAccountDetail",
            ReportKind::PersonalFilesStorage => "OneDriveUsageStorage",
            ReportKind::SiteDetail => "SharePointSiteUsageDetail",
            ReportKind::SiteStorage => "SharePointSiteUsageStorage",
        }
    }

    pub fn endpoint(&self) -> String {
        format!("get{}", self.file_stem())
    }

    fn columns(&self) -> Columns {
        match self {
            ReportKind::MailboxDetail => Columns {
                date: &["Report Refresh Date"],
                entity: &["User Principal Name"],
                kind: &["Recipient Type"],
                archive: &["Has Archive"],
            },
            ReportKind::PersonalFilesDetail => Columns {
                date: &["Report Refresh Date"],
                entity: &["Owner Principal Name"],
                kind: &["Site Type"],
                archive: &[],
            },
            ReportKind::SiteDetail => Columns {
                date: &["Report Refresh Date"],
                entity: &["Site Id", "Site URL"],
                kind: &["Root Web Template", "Site Type"],
                archive: &[],
            },
            ReportKind::MailboxStorage
            | ReportKind::PersonalFilesStorage
            | ReportKind::SiteStorage => Columns {
                date: &["Report Date"],
                entity: &[],
                kind: &["Site Type"],
                archive: &[],
            },
        }
    }
}

/// Candidate header names per field; the first present header is used.
struct Columns {
    date: &'static [&'static str],
    entity: &'static [&'static str],
    kind: &'static [&'static str],
    archive: &'static [&'static str],
}

const BYTES_COLUMN: &str = "Storage Used (Byte)";
const DELETED_COLUMN: &str = "Is Deleted";
const TENANT_ENTITY: &str = "tenant";

/// Source of usage report rows.
pub trait ReportSource {
    fn fetch(&self, kind: ReportKind, period_days: u32) -> Result<Vec<UsageSample>, Error>;
}

/// Parse a usage report CSV into samples.
///
/// Header lookup is by name and case-insensitive. A missing deletion, kind or
/// archive column reads as "not deleted", no kind and no archive. An empty
/// byte count reads as zero.
pub fn parse_report<R: Read>(kind: ReportKind, reader: R) -> Result<Vec<UsageSample>, Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = kind.columns();
    let date_idx = find_column(&headers, columns.date).ok_or_else(|| {
        Error::Report(format!("{}: missing date column", kind.file_stem()))
    })?;
    let bytes_idx = find_column(&headers, &[BYTES_COLUMN]).ok_or_else(|| {
        Error::Report(format!("{}: missing '{}' column", kind.file_stem(), BYTES_COLUMN))
    })?;
    let entity_idx = find_column(&headers, columns.entity);
    let deleted_idx = find_column(&headers, &[DELETED_COLUMN]);
    let kind_idx = find_column(&headers, columns.kind);
    let archive_idx = find_column(&headers, columns.archive);

    let mut samples = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let date = parse_date(field(Some(date_idx))).ok_or_else(|| {
            Error::Report(format!(
                "{}: row {}: invalid date '{}'",
                kind.file_stem(),
                line + 2,
                field(Some(date_idx))
            ))
        })?;
        let bytes = parse_bytes(field(Some(bytes_idx))).ok_or_else(|| {
            Error::Report(format!(
                "{}: row {}: invalid byte count '{}'",
                kind.file_stem(),
                line + 2,
                field(Some(bytes_idx))
            ))
        })?;
        let entity = match field(entity_idx) {
            "" => TENANT_ENTITY,
            id => id,
        };
        let entity_kind = field(kind_idx);

        samples.push(UsageSample {
            date,
            entity_id: entity.to_string(),
            bytes,
            deleted: parse_flag(field(deleted_idx)),
            kind: (!entity_kind.is_empty()).then(|| entity_kind.to_string()),
            has_archive: parse_flag(field(archive_idx)),
        });
    }

    debug!("{}: parsed {} rows", kind.file_stem(), samples.len());
    Ok(samples)
}

fn find_column(headers: &StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        headers.iter().position(|header| {
            header
                .trim_start_matches('\u{feff}')
                .trim()
                .eq_ignore_ascii_case(candidate)
        })
    })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .ok()
}

fn parse_bytes(value: &str) -> Option<u64> {
    if value.is_empty() {
        return Some(0);
    }
    value.parse().ok()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}

/// Reads reports exported as `<dir>/<FileStem>.csv`.
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, kind: ReportKind) -> PathBuf {
        self.dir.join(format!("{}.csv", kind.file_stem()))
    }
}

impl ReportSource for CsvDirectorySource {
    fn fetch(&self, kind: ReportKind, _period_days: u32) -> Result<Vec<UsageSample>, Error> {
        let path = self.path_for(kind);
        if !path.is_file() {
            return Err(Error::ReportMissing(path.display().to_string()));
        }
        parse_report(kind, File::open(&path)?)
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(120);
const REPORTS_ROLE: &str = "Reports Reader";

/// Downloads reports over HTTP with a pre-acquired bearer token.
pub struct GraphReportSource {
    base_url: String,
    token: String,
    agent: ureq::Agent,
}

impl GraphReportSource {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self {
            base_url: base_url.into(),
            token: token.into(),
            agent,
        }
    }

    pub fn report_url(&self, kind: ReportKind, period_days: u32) -> String {
        format!(
            "{}/reports/{}(period='D{}')",
            self.base_url.trim_end_matches('/'),
            kind.endpoint(),
            period_days
        )
    }
}

impl ReportSource for GraphReportSource {
    fn fetch(&self, kind: ReportKind, period_days: u32) -> Result<Vec<UsageSample>, Error> {
        let url = self.report_url(kind, period_days);
        debug!("GET {}", url);
        let response = match self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token.trim()))
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(401 | 403, _)) => {
                return Err(Error::Permission {
                    role: REPORTS_ROLE.to_string(),
                });
            }
            Err(ureq::Error::Status(404, _)) => {
                return Err(Error::ReportMissing(kind.endpoint()));
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(Error::Report(format!(
                    "{}: HTTP {}: {}",
                    kind.endpoint(),
                    code,
                    body.trim()
                )));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::Report(format!("{}: {}", kind.endpoint(), err)));
            }
        };
        parse_report(kind, response.into_reader())
    }
}
