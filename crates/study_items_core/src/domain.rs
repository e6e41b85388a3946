//! crates/study_items_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any wire or storage format; adapters
//! convert their own records into these types.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Study Items
//=========================================================================================

/// Processing state of a study item. Only the server moves an item between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyItemStatus {
    Queued,
    Processing,
    Done,
}

impl StudyItemStatus {
    /// The wire representation used by the REST API.
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyItemStatus::Queued => "QUEUED",
            StudyItemStatus::Processing => "PROCESSING",
            StudyItemStatus::Done => "DONE",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            StudyItemStatus::Queued => "Queued",
            StudyItemStatus::Processing => "Processing",
            StudyItemStatus::Done => "Done",
        }
    }
}

impl fmt::Display for StudyItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a status string is not one the API defines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown study item status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for StudyItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(StudyItemStatus::Queued),
            "PROCESSING" => Ok(StudyItemStatus::Processing),
            "DONE" => Ok(StudyItemStatus::Done),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A single study item as held by the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyItem {
    /// Opaque, server-assigned identifier.
    pub id: String,
    pub topic: String,
    pub status: StudyItemStatus,
    pub created_at: DateTime<Utc>,
    /// Never earlier than `created_at`.
    pub updated_at: DateTime<Utc>,
    /// Markdown body, only present on a detail fetch.
    pub content: Option<String>,
}

impl StudyItem {
    pub fn was_updated(&self) -> bool {
        self.updated_at != self.created_at
    }
}

/// One page of the server-paginated collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsPage {
    pub items: Vec<StudyItem>,
    /// Opaque continuation token; `None` means the collection is exhausted.
    pub cursor: Option<String>,
}

//=========================================================================================
// Authentication
//=========================================================================================

/// Tokens issued by the identity provider.
#[derive(Clone, PartialEq)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at: DateTime<Utc>,
}

// Tokens are credentials; keep them out of debug output.
impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token_len", &self.id_token.len())
            .field("access_token_len", &self.access_token.len())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// A token set as read back from durable client storage.
#[derive(Clone, PartialEq)]
pub struct PersistedTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub persisted_at: DateTime<Utc>,
}

impl PersistedTokens {
    pub fn into_token_set(self) -> TokenSet {
        TokenSet {
            id_token: self.id_token,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            issued_at: self.persisted_at,
        }
    }
}

impl fmt::Debug for PersistedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedTokens")
            .field("id_token_len", &self.id_token.len())
            .field("persisted_at", &self.persisted_at)
            .finish()
    }
}

/// The signed-in user, as shown to the person using the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
}

/// Lifecycle of the session manager. Collection stores wait for a settled phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    /// Authenticated, and the authorization value is available to requests.
    Ready,
    /// Initialization finished without a usable session, or the session ended.
    Failed,
}

impl SessionPhase {
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Failed)
    }
}

/// Authentication state owned by the session manager.
#[derive(Debug, Clone)]
pub struct Session {
    pub phase: SessionPhase,
    pub is_loading: bool,
    pub user: Option<User>,
    pub tokens: Option<TokenSet>,
    pub error: Option<String>,
}

impl Session {
    pub fn empty() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            is_loading: false,
            user: None,
            tokens: None,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Ready && self.tokens.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::empty()
    }
}

//=========================================================================================
// Registration
//=========================================================================================

/// Data sent to the identity provider to register a new account.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Where a confirmation code was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDelivery {
    pub destination: Option<String>,
    pub medium: Option<String>,
}

/// Result of a successful sign-up call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user_sub: String,
    pub needs_confirmation: bool,
    pub delivery: Option<CodeDelivery>,
}
