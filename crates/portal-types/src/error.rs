//! Error types shared by the geoportal crates.

use thiserror::Error;

/// Unified error type for configuration and persistence.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Repository error
    #[error("Repository error: {0}")]
    Repository(String),
}
