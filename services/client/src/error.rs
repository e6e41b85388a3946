//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use study_items_core::{AuthError, CollectionError, DetailError, PortError, RegistrationError};

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a failure reported by the identity provider or token checks.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Represents a failed collection operation (create, delete, pagination).
    #[error("{0}")]
    Collection(#[from] CollectionError),

    /// Represents a failed single-item fetch.
    #[error("{0}")]
    Detail(#[from] DetailError),

    /// Represents a registration form that failed validation.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Represents an error from the underlying HTTP client library.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., reading from stdin).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
