use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Logging/tracing configuration (ADDED: the ambient stack the distilled
/// spec leaves implicit). `trace_frames` gates the hex dump of raw wire
/// frames emitted at TRACE level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub log_dir: Option<String>,
    pub trace_frames: bool,
    pub level: String,
    pub format: String,
    pub include_location: bool,
    pub thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            trace_frames: false,
            level: "info".to_string(),
            format: "pretty".to_string(),
            include_location: false,
            thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}
