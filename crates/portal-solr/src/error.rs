//! Error types for the engine client.

use thiserror::Error;

/// Errors from search engine operations.
#[derive(Debug, Error)]
pub enum SolrError {
    /// Transport-level failure talking to the engine
    #[error("Engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a non-success status
    #[error("Engine error (HTTP {status}): {message}")]
    Engine { status: u16, message: String },

    /// Client or schema configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = SolrError::Engine {
            status: 503,
            message: "core is loading".to_string(),
        };
        assert_eq!(err.to_string(), "Engine error (HTTP 503): core is loading");
    }
}
