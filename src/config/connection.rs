use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigValidationError;

/// TCP server connection-admission limits (§4.9, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub max_connections: usize,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    pub per_ip_limit: Option<usize>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            idle_timeout: Duration::from_secs(30),
            per_ip_limit: Some(10),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_connections == 0 {
            return Err(ConfigValidationError::config("max_connections must be non-zero"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigValidationError::config("idle_timeout must be non-zero"));
        }
        if let Some(limit) = self.per_ip_limit {
            if limit == 0 {
                return Err(ConfigValidationError::config("per_ip_limit must be non-zero when set"));
            }
            if limit > self.max_connections {
                return Err(ConfigValidationError::config(
                    "per_ip_limit cannot exceed max_connections",
                ));
            }
        }
        Ok(())
    }
}

impl From<ConnectionConfig> for crate::connection::ConnectionConfig {
    fn from(config: ConnectionConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            idle_timeout: config.idle_timeout,
            per_ip_limit: config.per_ip_limit,
        }
    }
}
