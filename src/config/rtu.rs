use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{DataBits, Parity, StopBits};

/// Serial line parameters for the Modbus/RTU transport (§6: default 9600 8N1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RtuConfig {
    pub device: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flush_after_write: bool,
    #[serde(with = "humantime_serde")]
    pub serial_timeout: Duration,
}

impl Default for RtuConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            flush_after_write: true,
            serial_timeout: Duration::from_millis(50),
        }
    }
}

impl RtuConfig {
    pub fn serial_port_info(&self) -> String {
        format!(
            "{}@{} {}{}{}",
            self.device,
            self.baud_rate,
            self.data_bits,
            match self.parity {
                Parity::None => 'N',
                Parity::Odd => 'O',
                Parity::Even => 'E',
            },
            self.stop_bits
        )
    }
}
