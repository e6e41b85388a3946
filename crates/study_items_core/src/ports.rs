//! crates/study_items_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the REST transport, the identity provider and the storage
//! used for persisted tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CodeDelivery, ItemsPage, PersistedTokens, SignUpOutcome, SignUpRequest, StudyItem, TokenSet};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for data port operations.
/// This abstracts away the specific errors from the transport (e.g., HTTP status codes).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures reported by the identity provider or by token validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is not confirmed")]
    NotConfirmed,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Session expired, please sign in again")]
    SessionExpired,
    #[error("Request rejected by identity provider: {0}")]
    Rejected(String),
}

/// A convenience type alias for `Result<T, AuthError>`.
pub type AuthResult<T> = Result<T, AuthError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Raw REST transport for the study items collection.
///
/// `authorization` is the full header value (`Bearer ...`) or `None` for an
/// anonymous request. A 401 response must surface as `PortError::Unauthorized`
/// and a 404 as `PortError::NotFound`.
#[async_trait]
pub trait StudyItemsApi: Send + Sync {
    async fn list_items(
        &self,
        cursor: Option<&str>,
        limit: usize,
        authorization: Option<&str>,
    ) -> PortResult<ItemsPage>;

    async fn get_item(&self, id: &str, authorization: Option<&str>) -> PortResult<StudyItem>;

    async fn create_item(&self, topic: &str, authorization: Option<&str>) -> PortResult<StudyItem>;

    async fn delete_item(&self, id: &str, authorization: Option<&str>) -> PortResult<()>;
}

/// Hosted identity provider client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The provider client's own active session, if it holds one.
    async fn current_session(&self) -> AuthResult<Option<TokenSet>>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<TokenSet>;

    /// Ends the session at the provider. `access_token` is `None` when no
    /// session was held locally.
    async fn sign_out(&self, access_token: Option<&str>) -> AuthResult<()>;

    /// Exchanges a refresh token for a fresh token set.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenSet>;

    // --- Registration ---
    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome>;

    async fn confirm_sign_up(&self, email: &str, code: &str) -> AuthResult<()>;

    async fn resend_confirmation_code(&self, email: &str) -> AuthResult<CodeDelivery>;
}

/// Durable client-side storage for the token set.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns `Ok(None)` when nothing usable is stored. Implementations discard
    /// records that cannot be parsed.
    async fn load(&self) -> PortResult<Option<PersistedTokens>>;

    async fn save(&self, tokens: &TokenSet, persisted_at: DateTime<Utc>) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;
}

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
