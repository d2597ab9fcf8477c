use std::time::Duration;

/// Limits and timeouts applied by the [`super::Manager`] (§4.9, §5).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_connections: usize,
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
