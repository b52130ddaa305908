use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Length of the historical usage window requested from the reports.
    pub period_days: u32,
    /// Growth reported when a workload has too little history to estimate.
    pub default_growth_percent: i64,
    /// Directory holding exported usage report CSVs.
    pub report_dir: String,
    /// Directory the rendered report is written to.
    pub output_dir: String,
    pub group_members_file: String,
    pub archive_statistics_file: String,
    pub graph_base_url: String,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            period_days: 180,
            default_growth_percent: crate::growth::DEFAULT_GROWTH_PERCENT,
            report_dir: "reports".to_string(),
            output_dir: ".".to_string(),
            group_members_file: "reports/GroupMembers.csv".to_string(),
            archive_statistics_file: "reports/ArchiveMailboxStatistics.csv".to_string(),
            graph_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            session: SessionConfig::default(),
        }
    }
}

/// Timing limits for the archive statistics session, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_session_secs: u64,
    pub retry_delay_secs: u64,
    pub max_consecutive_failures: u32,
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_session_secs: 870,
            retry_delay_secs: 60,
            max_consecutive_failures: 3,
            reconnect_grace_secs: 420,
        }
    }
}

impl SessionConfig {
    pub fn max_session_age(&self) -> Duration {
        Duration::from_secs(self.max_session_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Pause before a proactive reconnect: half the session limit minus the
    /// grace constant, never negative.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs((self.max_session_secs / 2).saturating_sub(self.reconnect_grace_secs))
    }
}

/// Load `Config.toml` (optional) overlaid with `SIZER__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("SIZER").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
