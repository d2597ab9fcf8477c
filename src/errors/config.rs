use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("configuration error: {0}")]
    Config(String),
}

impl ConfigValidationError {
    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }
}

impl From<config::ConfigError> for ConfigValidationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
