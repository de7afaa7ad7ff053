//! Queue configuration error types

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Queue already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Queue not found: {name}")]
    NotFound { name: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
