use serde::{Deserialize, Serialize};

/// Modbus/TCP server bind configuration (§6: default port 502).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpConfig {
    pub bind_addr: String,
    pub bind_port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            bind_port: 502,
        }
    }
}
