use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Report not found: {0}")]
    ReportMissing(String),

    #[error("Insufficient permissions to read usage reports; the '{role}' role is required")]
    Permission { role: String },

    #[error("Group '{0}' was not found")]
    GroupNotFound(String),

    #[error("Group '{0}' has no members")]
    EmptyGroup(String),

    #[error("Session could not be established after {attempts} consecutive attempts: {last_error}")]
    SessionFailed { attempts: u32, last_error: String },

    #[error("Archive statistics error: {0}")]
    Archive(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl Error {
    /// Errors that abort the whole run instead of a single workload.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Permission { .. } | Error::GroupNotFound(_) | Error::EmptyGroup(_)
        )
    }

    /// Errors that fail identically on every attempt, so retrying is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::Csv(_) | Error::Config(_) | Error::Permission { .. }
        )
    }
}
