use serde::{Deserialize, Serialize};

/// HTTP status surface configuration: `/health` and `/stats` endpoints,
/// off the wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind_addr: String,
    pub bind_port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0".to_string(),
            bind_port: 8081,
        }
    }
}
