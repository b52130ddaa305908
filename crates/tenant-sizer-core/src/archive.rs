use crate::error::Error;
use crate::model::ArchiveSizing;
use crate::progress::ProgressReporter;
use crate::session::{Clock, Connector, RemoteSession, SessionManager};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A session that can report the archive size of one mailbox.
pub trait ArchiveSession: RemoteSession {
    /// Raw size text, e.g. `"1.5 GB (1,610,612,736 bytes)"`.
    fn archive_size(&mut self, mailbox: &str) -> Result<String, Error>;
}

fn bytes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(\d[\d,]*)\s*bytes").expect("valid regex"))
}

/// Extract the byte count from an `N bytes` size string. Digit groups may be
/// comma separated; when several counts appear the last one wins.
pub fn parse_archive_size(text: &str) -> Option<u64> {
    let captures = bytes_pattern().captures_iter(text).last()?;
    let digits: String = captures[1].chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

/// Walk the given mailboxes and total their archive sizes.
///
/// Every lookup is preceded by a session health check. A mailbox whose lookup
/// fails, or whose size cannot be parsed, is skipped; only a terminal session
/// failure ends the walk early.
pub fn collect_archive_sizing<C, K>(
    manager: &mut SessionManager<C, K>,
    mailboxes: &[String],
    reporter: &dyn ProgressReporter,
) -> Result<ArchiveSizing, Error>
where
    C: Connector,
    C::Session: ArchiveSession,
    K: Clock,
{
    let start = Instant::now();
    let mut sizing = ArchiveSizing::default();
    reporter.on_archive_start(mailboxes.len());

    for (index, mailbox) in mailboxes.iter().enumerate() {
        let session = manager.ensure_healthy_session()?;
        match session.archive_size(mailbox) {
            Ok(text) => match parse_archive_size(&text) {
                Some(bytes) => {
                    sizing.mailbox_count += 1;
                    sizing.total_bytes = sizing.total_bytes.saturating_add(bytes);
                }
                None => {
                    debug!("Unparsable archive size for {}: {:?}", mailbox, text);
                    sizing.skipped += 1;
                }
            },
            Err(err) => {
                warn!("Archive statistics failed for {}: {}", mailbox, err);
                sizing.skipped += 1;
            }
        }
        reporter.on_archive_progress(index + 1, mailboxes.len());
    }

    manager.shutdown();

    if sizing.mailbox_count > 0 {
        sizing.average_bytes = sizing.total_bytes / sizing.mailbox_count;
    }
    info!(
        "{} archives measured, {} skipped",
        sizing.mailbox_count, sizing.skipped
    );
    reporter.on_archive_complete(&sizing, start.elapsed().as_secs_f64());
    Ok(sizing)
}

#[derive(Debug, Deserialize)]
struct StatisticsRow {
    #[serde(rename = "Identity")]
    identity: String,
    #[serde(rename = "TotalItemSize")]
    total_item_size: String,
}

/// Connector over an exported archive statistics CSV (`Identity`,
/// `TotalItemSize`). Each connect re-reads the export. A missing export is a
/// retryable handshake failure; a malformed one fails at once.
pub struct StatisticsExportConnector {
    path: PathBuf,
}

impl StatisticsExportConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Connector for StatisticsExportConnector {
    type Session = StatisticsExportSession;

    fn connect(&mut self) -> Result<Self::Session, Error> {
        if !self.path.is_file() {
            return Err(Error::Archive(format!(
                "statistics export not found: {}",
                self.path.display()
            )));
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut sizes = HashMap::new();
        for row in reader.deserialize::<StatisticsRow>() {
            let row = row?;
            sizes.insert(row.identity.trim().to_lowercase(), row.total_item_size);
        }
        debug!("Loaded {} archive statistics rows", sizes.len());
        Ok(StatisticsExportSession { sizes, open: true })
    }
}

pub struct StatisticsExportSession {
    sizes: HashMap<String, String>,
    open: bool,
}

impl RemoteSession for StatisticsExportSession {
    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        self.sizes.clear();
    }
}

impl ArchiveSession for StatisticsExportSession {
    fn archive_size(&mut self, mailbox: &str) -> Result<String, Error> {
        self.sizes
            .get(&mailbox.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::Archive(format!("no archive statistics for {}", mailbox)))
    }
}
