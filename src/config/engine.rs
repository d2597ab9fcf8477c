use std::path::PathBuf;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{ConnectionConfig, HttpConfig, LoggingConfig, MasterConfig, RtuConfig, TcpConfig};
use crate::errors::ConfigValidationError;

/// Top-level engine configuration, aggregating the TCP server, RTU line,
/// master retry policy, HTTP status surface, logging, and connection-limit
/// sections. Layered as built-in defaults, then `config/default.yaml`, then
/// `config/{RUN_MODE}.yaml`, then `config/local.yaml`, then
/// `MODBUS_ENGINE_*` environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub tcp: TcpConfig,
    pub rtu: RtuConfig,
    pub master: MasterConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub connection: ConnectionConfig,
}

impl EngineConfig {
    pub const CONFIG_DIR: &'static str = "config";
    const ENV_PREFIX: &'static str = "MODBUS_ENGINE";

    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = EngineConfig::default();

        let builder = ConfigBuilder::builder()
            .set_default("tcp.bind_addr", defaults.tcp.bind_addr)?
            .set_default("tcp.bind_port", defaults.tcp.bind_port)?
            .set_default("rtu.device", defaults.rtu.device)?
            .set_default("rtu.baud_rate", defaults.rtu.baud_rate)?
            .set_default("rtu.data_bits", defaults.rtu.data_bits.to_string())?
            .set_default("rtu.parity", defaults.rtu.parity.to_string())?
            .set_default("rtu.stop_bits", defaults.rtu.stop_bits.to_string())?
            .set_default("rtu.flush_after_write", defaults.rtu.flush_after_write)?
            .set_default(
                "rtu.serial_timeout",
                format!("{}ms", defaults.rtu.serial_timeout.as_millis()),
            )?
            .set_default(
                "master.timeout",
                format!("{}s", defaults.master.timeout.as_secs()),
            )?
            .set_default("master.max_attempts", defaults.master.max_attempts)?
            .set_default(
                "master.retry_pause",
                format!("{}ms", defaults.master.retry_pause.as_millis()),
            )?
            .set_default("http.enabled", defaults.http.enabled)?
            .set_default("http.bind_addr", defaults.http.bind_addr)?
            .set_default("http.bind_port", defaults.http.bind_port)?
            .set_default("logging.trace_frames", defaults.logging.trace_frames)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("logging.include_location", defaults.logging.include_location)?
            .set_default("logging.thread_ids", defaults.logging.thread_ids)?
            .set_default("connection.max_connections", defaults.connection.max_connections)?
            .set_default(
                "connection.idle_timeout",
                format!("{}s", defaults.connection.idle_timeout.as_secs()),
            )?
            .set_default("connection.per_ip_limit", defaults.connection.per_ip_limit)?
            .add_source(File::new(
                &format!("{}/default", Self::CONFIG_DIR),
                FileFormat::Yaml,
            ).required(false))
            .add_source(
                File::new(&format!("{}/{}", Self::CONFIG_DIR, environment), FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::new(&format!("{}/local", Self::CONFIG_DIR), FileFormat::Yaml).required(false),
            )
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;
        Self::validate(&config).map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = builder.try_deserialize()?;
        Self::validate(&config).map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(config: &Self) -> Result<(), ConfigValidationError> {
        if config.tcp.bind_addr.is_empty() {
            return Err(ConfigValidationError::config("tcp.bind_addr must not be empty"));
        }
        if config.tcp.bind_port == 0 {
            return Err(ConfigValidationError::config("tcp.bind_port must be non-zero"));
        }
        if config.rtu.device.is_empty() {
            return Err(ConfigValidationError::config("rtu.device must not be empty"));
        }
        if config.rtu.baud_rate == 0 {
            return Err(ConfigValidationError::config("rtu.baud_rate must be non-zero"));
        }
        if config.master.timeout.is_zero() {
            return Err(ConfigValidationError::config("master.timeout must be non-zero"));
        }
        if config.master.max_attempts == 0 {
            return Err(ConfigValidationError::config("master.max_attempts must be non-zero"));
        }
        match config.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigValidationError::config("invalid logging.level")),
        }
        match config.logging.format.to_lowercase().as_str() {
            "pretty" | "json" => {}
            _ => return Err(ConfigValidationError::config("invalid logging.format")),
        }
        config
            .connection
            .validate()
            .map_err(|e| ConfigValidationError::config(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    #[serial_test::serial]
    fn default_config_has_expected_ports() {
        let config = EngineConfig::load().unwrap();
        assert_eq!(config.tcp.bind_port, 502);
        assert_eq!(config.http.bind_port, 8081);
    }

    #[test]
    #[serial_test::serial]
    fn env_override_wins_over_defaults() {
        std::env::set_var("MODBUS_ENGINE_TCP__BIND_PORT", "5020");
        let config = EngineConfig::load().unwrap();
        assert_eq!(config.tcp.bind_port, 5020);
        std::env::remove_var("MODBUS_ENGINE_TCP__BIND_PORT");
    }

    #[test]
    #[serial_test::serial]
    fn loads_explicit_file_and_overrides_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
            tcp:
              bind_addr: "192.168.1.50"
              bind_port: 1502
            rtu:
              device: "/dev/ttyAMA0"
              baud_rate: 19200
              data_bits: 8
              parity: "none"
              stop_bits: "one"
              flush_after_write: true
              serial_timeout: "50ms"
            master:
              timeout: "2s"
              max_attempts: 3
              retry_pause: "500ms"
            http:
              enabled: true
              bind_addr: "0.0.0.0"
              bind_port: 8081
            logging:
              log_dir: null
              trace_frames: true
              level: "debug"
              format: "json"
              include_location: true
              thread_ids: false
            connection:
              max_connections: 50
              idle_timeout: "15s"
              per_ip_limit: 5
            "#,
        )
        .unwrap();

        let config = EngineConfig::from_file(config_path).unwrap();
        assert_eq!(config.tcp.bind_addr, "192.168.1.50");
        assert_eq!(config.rtu.baud_rate, 19200);
        assert!(config.logging.trace_frames);
        assert_eq!(config.connection.per_ip_limit, Some(5));
    }

    #[test]
    #[serial_test::serial]
    fn validation_rejects_zero_port() {
        std::env::set_var("MODBUS_ENGINE_TCP__BIND_PORT", "0");
        assert!(EngineConfig::load().is_err());
        std::env::remove_var("MODBUS_ENGINE_TCP__BIND_PORT");
    }
}
