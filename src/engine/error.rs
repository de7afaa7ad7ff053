use crate::config::ConfigError;
use thiserror::Error;

/// Errors from consumer transports and the consumption engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Consumer error: {message}")]
    Consumer { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn consumer(message: impl Into<String>) -> Self {
        Self::Consumer {
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
