use thiserror::Error;

/// Errors from stats persistence
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Time-series sink failure: {message}")]
    Sink { message: String },
}

impl StatsError {
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }
}

pub type StatsResult<T> = Result<T, StatsError>;
