//! Error types for ferry.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Covers startup and collaborator failures (configuration, keys, actor
/// document rendering). Inbox processing has its own taxonomy in the
/// federation crate.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key store error: {0}")]
    KeyStore(String),
}

impl AppError {
    /// Returns the error code used in logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::KeyStore(_) => "KEY_STORE_ERROR",
        }
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid server url: {err}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Config("x".into()).error_code(), "CONFIG_ERROR");
        assert_eq!(
            AppError::KeyStore("x".into()).to_string(),
            "Key store error: x"
        );
    }

    #[test]
    fn test_from_url_error() {
        let err = AppError::from(url::Url::parse("no scheme").unwrap_err());
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error: invalid server url"));
    }
}
