use chrono::{FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::core::analytics::DEFAULT_TOP_LIMIT;
use crate::core::timeline::DEFAULT_BUCKET_MINUTES;

/// Dashboard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Offset from UTC in minutes; the host's local offset when unset
    pub timezone_offset_minutes: Option<i32>,
    /// Number of endpoints and IPs kept in the rankings
    pub top_limit: usize,
    /// Timeline bucket width in minutes
    pub bucket_minutes: u32,
}

impl DashboardConfig {
    /// Time zone used for timeline buckets and CSV dates
    pub fn time_zone(&self) -> FixedOffset {
        self.timezone_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes.saturating_mul(60)))
            .unwrap_or_else(|| Local::now().offset().fix())
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            timezone_offset_minutes: None,
            top_limit: DEFAULT_TOP_LIMIT,
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory receiving exported files
    pub output_dir: String,
}

impl ExportConfig {
    /// Timestamped file name, e.g. `ddos_detailed_report_2024-01-01T12-00-00.csv`
    pub fn file_name(&self, prefix: &str, extension: &str) -> String {
        format!(
            "{}_{}.{}",
            prefix,
            Utc::now().format("%Y-%m-%dT%H-%M-%S"),
            extension
        )
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "exports".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dashboard configuration
    pub dashboard: DashboardConfig,
    /// Export configuration
    pub export: ExportConfig,
}
