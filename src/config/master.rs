use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Master-side retry/timeout policy (§4.7): fixed attempt budget, not
/// exponential backoff — the original only ever retries a flat three times.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub retry_pause: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            retry_pause: Duration::from_millis(500),
        }
    }
}
