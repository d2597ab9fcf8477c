use thiserror::Error;

use super::{
    ConfigValidationError, ConnectionError, DataModelError, FrameError, InitializationError,
    MasterError,
};

/// Top-level error type for the engine, composed from the per-concern
/// `FrameError`/`MasterError`/`ConnectionError`/`DataModelError`/
/// `ConfigValidationError` variants.
#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("data model error: {0}")]
    DataModel(#[from] DataModelError),

    #[error("master error: {0}")]
    Master(#[from] MasterError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("initialization error: {0}")]
    Init(#[from] InitializationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ModbusError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(ConfigValidationError::config(err.to_string()))
    }
}
