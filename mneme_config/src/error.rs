use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory could not be determined")]
    NoConfigDir,

    #[error("config file I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for mneme_core::CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoConfigDir => Self::Validation(err.to_string()),
            other => Self::Other(other.into()),
        }
    }
}
