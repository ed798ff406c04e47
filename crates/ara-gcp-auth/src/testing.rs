//! Token-source doubles for tests and local development.
//!
//! These live in the library (not behind `cfg(test)`) so downstream crates
//! can drive their own tests with deterministic tokens instead of mocking
//! Google endpoints.

use crate::source::IdTokenSource;

/// Error type used by the doubles in this module.
#[derive(Debug)]
pub struct StubTokenError(String);

impl StubTokenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for StubTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StubTokenError {}

/// Source that always yields the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl IdTokenSource for StaticTokenSource {
    type Error = StubTokenError;

    async fn id_token(&self) -> Result<String, StubTokenError> {
        Ok(self.token.clone())
    }
}

/// Source that always fails with the configured message.
#[derive(Debug, Clone)]
pub struct FailingTokenSource {
    message: String,
}

impl FailingTokenSource {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IdTokenSource for FailingTokenSource {
    type Error = StubTokenError;

    async fn id_token(&self) -> Result<String, StubTokenError> {
        Err(StubTokenError::new(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_repeats_its_token() {
        let source = StaticTokenSource::new("T1");
        assert_eq!(source.id_token().await.unwrap(), "T1");
        assert_eq!(source.id_token().await.unwrap(), "T1");
    }

    #[tokio::test]
    async fn failing_source_reports_its_message() {
        let source = FailingTokenSource::new("metadata server unreachable");
        let err = source.id_token().await.unwrap_err();
        assert_eq!(err.to_string(), "metadata server unreachable");
    }
}
