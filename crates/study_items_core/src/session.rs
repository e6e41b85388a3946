//! crates/study_items_core/src/session.rs
//!
//! The session manager: the single owner of authentication state.
//!
//! It restores or acquires a token set, persists it, checks its expiry, refreshes
//! it when the API rejects it, and publishes a settled phase that collection
//! stores wait on before their first fetch.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::claims::{check_token_validity, decode_claims};
use crate::domain::{
    CodeDelivery, PersistedTokens, Session, SessionPhase, SignUpOutcome, SignUpRequest, TokenSet, User,
};
use crate::ports::{AuthError, AuthResult, Clock, IdentityProvider, TokenStore};

/// Persisted tokens older than this are never restored.
pub const PERSISTED_MAX_AGE_HOURS: i64 = 24;

/// Where an accepted token set came from during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Provider,
    Persisted,
}

//=========================================================================================
// Diagnostics
//=========================================================================================

/// A report on the persisted token record, for troubleshooting sign-in problems.
#[derive(Debug, Clone)]
pub struct AuthDiagnostics {
    pub phase: SessionPhase,
    pub authenticated: bool,
    pub persisted: Option<PersistedDiagnostics>,
    /// Set when the token store itself could not be read.
    pub store_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PersistedDiagnostics {
    pub age: Duration,
    pub has_refresh_token: bool,
    pub exp: Option<i64>,
    pub expires_in_secs: Option<i64>,
    pub is_expired: bool,
    /// Whether `initialize` would accept this record right now.
    pub restorable: bool,
    pub decode_error: Option<String>,
}

//=========================================================================================
// SessionManager
//=========================================================================================

pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    token_store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<Session>,
    /// Serializes token refreshes so concurrent 401s share one provider call.
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        token_store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(Session::empty());
        Self {
            identity,
            token_store,
            clock,
            state,
            refresh_lock: Mutex::new(()),
        }
    }

    /// A copy of the current session state.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Observe every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Resolves once initialization has finished, successfully or not.
    ///
    /// Never resolves if `initialize` is never called.
    pub async fn wait_settled(&self) -> SessionPhase {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|s| s.phase.is_settled()).await.map(|s| s.phase);
        settled.unwrap_or_else(|_| self.phase())
    }

    /// The `Authorization` header value for an outbound request, or `None` when
    /// unauthenticated. Read it for every request; do not cache it.
    pub fn authorization_value(&self) -> Option<String> {
        let session = self.state.borrow();
        if !session.is_authenticated() {
            return None;
        }
        session.tokens.as_ref().map(|t| bearer(&t.id_token))
    }

    /// True when a session is held but its identity token is inside the expiry margin.
    pub fn token_needs_refresh(&self) -> bool {
        let now = self.clock.now();
        let session = self.state.borrow();
        match (&session.tokens, session.is_authenticated()) {
            (Some(tokens), true) => check_token_validity(&tokens.id_token, now).is_err(),
            _ => false,
        }
    }

    //-------------------------------------------------------------------------------------
    // Lifecycle
    //-------------------------------------------------------------------------------------

    /// Establishes the session at startup.
    ///
    /// The identity provider's own session is tried first, then the persisted
    /// token set. Anything else leaves the manager unauthenticated.
    pub async fn initialize(&self) -> SessionPhase {
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Initializing;
            s.is_loading = true;
            s.error = None;
        });

        let now = self.clock.now();
        match self.restore(now).await {
            Ok(Some((tokens, user, source))) => {
                info!("Session restored from {:?} for user {}", source, user.id);
                if source == TokenSource::Provider {
                    self.persist(&tokens).await;
                }
                self.set_authenticated(tokens, user);
            }
            Ok(None) => {
                info!("No usable session found; continuing unauthenticated.");
                self.set_unauthenticated(None);
            }
            Err(e) => {
                warn!("Session initialization failed: {}", e);
                self.set_unauthenticated(Some(e.to_string()));
            }
        }
        self.phase()
    }

    /// Returns the manager to its initial state. Durable storage is left untouched.
    pub fn teardown(&self) {
        debug!("Session manager torn down.");
        self.state.send_replace(Session::empty());
    }

    async fn restore(&self, now: DateTime<Utc>) -> AuthResult<Option<(TokenSet, User, TokenSource)>> {
        // --- 1. Ask the identity provider for its active session ---
        let mut provider_error = None;
        match self.identity.current_session().await {
            Ok(Some(tokens)) => match user_for(&tokens, now) {
                Ok(user) => return Ok(Some((tokens, user, TokenSource::Provider))),
                Err(e) => debug!("Provider session rejected: {}", e),
            },
            Ok(None) => debug!("Identity provider holds no active session."),
            Err(e) => {
                warn!("Identity provider query failed: {}", e);
                provider_error = Some(e);
            }
        }

        // --- 2. Fall back to the persisted token set ---
        match self.token_store.load().await {
            Ok(Some(persisted)) => match accept_persisted(persisted, now) {
                Ok((tokens, user)) => return Ok(Some((tokens, user, TokenSource::Persisted))),
                Err(e) => {
                    info!("Discarding persisted tokens: {}", e);
                    if let Err(e) = self.token_store.clear().await {
                        warn!("Failed to clear persisted tokens: {}", e);
                    }
                }
            },
            Ok(None) => debug!("No persisted tokens."),
            Err(e) => warn!("Failed to read persisted tokens: {}", e),
        }

        match provider_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    //-------------------------------------------------------------------------------------
    // Sign in / sign out
    //-------------------------------------------------------------------------------------

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<User> {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = async {
            let tokens = self.identity.sign_in(email, password).await?;
            let user = user_for(&tokens, self.clock.now())?;
            Ok::<_, AuthError>((tokens, user))
        }
        .await;

        match result {
            Ok((tokens, user)) => {
                info!("Signed in as {}", user.id);
                self.persist(&tokens).await;
                self.set_authenticated(tokens, user.clone());
                Ok(user)
            }
            Err(e) => {
                warn!("Sign-in failed: {}", e);
                self.set_unauthenticated(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Signs out at the provider, then clears local state and storage no matter
    /// what the provider answered. A provider failure is returned afterwards.
    pub async fn sign_out(&self) -> AuthResult<()> {
        self.state.send_modify(|s| s.is_loading = true);
        let access_token = self.state.borrow().tokens.as_ref().map(|t| t.access_token.clone());

        let provider_result = self.identity.sign_out(access_token.as_deref()).await;
        if let Err(e) = &provider_result {
            warn!("Provider sign-out failed; clearing local session anyway: {}", e);
        }

        self.clear_persisted().await;
        self.set_unauthenticated(None);
        info!("Signed out.");
        provider_result
    }

    //-------------------------------------------------------------------------------------
    // Token refresh
    //-------------------------------------------------------------------------------------

    /// Called after the API rejected `rejected` with a 401.
    ///
    /// If another request already replaced that value, the current one is
    /// returned without contacting the provider. Otherwise the refresh token is
    /// exchanged once. Any refresh failure, an unreachable provider included,
    /// ends the session; the provider's message is kept in `error`.
    pub async fn refresh_after_rejection(&self, rejected: Option<&str>) -> AuthResult<String> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.authorization_value() {
            if rejected != Some(current.as_str()) {
                debug!("Token already refreshed by a concurrent request.");
                return Ok(current);
            }
        }

        let refresh_token = self
            .state
            .borrow()
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty());
        let Some(refresh_token) = refresh_token else {
            let held = self.state.borrow().tokens.is_some();
            if held {
                info!("No refresh token held; ending session.");
                self.clear_persisted().await;
                self.set_unauthenticated(Some(AuthError::SessionExpired.to_string()));
            }
            return Err(AuthError::SessionExpired);
        };

        info!("Refreshing identity token.");
        let refreshed = async {
            let tokens = self.identity.refresh(&refresh_token).await?;
            let user = user_for(&tokens, self.clock.now())?;
            Ok::<_, AuthError>((tokens, user))
        }
        .await;

        match refreshed {
            Ok((tokens, user)) => {
                let value = bearer(&tokens.id_token);
                self.persist(&tokens).await;
                self.set_authenticated(tokens, user);
                Ok(value)
            }
            Err(e) => {
                warn!("Token refresh failed; ending session: {}", e);
                let message = match e {
                    AuthError::ProviderUnavailable(msg) => format!("{} ({})", AuthError::SessionExpired, msg),
                    _ => AuthError::SessionExpired.to_string(),
                };
                self.clear_persisted().await;
                self.set_unauthenticated(Some(message));
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Refreshes ahead of a request when the token is inside the expiry margin.
    pub async fn ensure_fresh(&self) -> AuthResult<()> {
        if !self.token_needs_refresh() {
            return Ok(());
        }
        let current = self.authorization_value();
        self.refresh_after_rejection(current.as_deref()).await.map(|_| ())
    }

    //-------------------------------------------------------------------------------------
    // Registration (no effect on session state)
    //-------------------------------------------------------------------------------------

    pub async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        let outcome = self.identity.sign_up(request).await?;
        info!(
            "Registered {} (confirmation needed: {})",
            outcome.user_sub, outcome.needs_confirmation
        );
        Ok(outcome)
    }

    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> AuthResult<()> {
        self.identity.confirm_sign_up(email, code.trim()).await
    }

    pub async fn resend_confirmation_code(&self, email: &str) -> AuthResult<CodeDelivery> {
        self.identity.resend_confirmation_code(email).await
    }

    //-------------------------------------------------------------------------------------
    // Diagnostics
    //-------------------------------------------------------------------------------------

    pub async fn diagnose(&self) -> AuthDiagnostics {
        let now = self.clock.now();
        let session = self.snapshot();
        let (persisted, store_error) = match self.token_store.load().await {
            Ok(Some(record)) => (Some(diagnose_record(&record, now)), None),
            Ok(None) => (None, None),
            Err(e) => (None, Some(e.to_string())),
        };
        AuthDiagnostics {
            phase: session.phase,
            authenticated: session.is_authenticated(),
            persisted,
            store_error,
        }
    }

    /// Removes the persisted token record. In-memory state is unchanged.
    pub async fn clear_persisted(&self) {
        if let Err(e) = self.token_store.clear().await {
            warn!("Failed to clear persisted tokens: {}", e);
        }
    }

    //-------------------------------------------------------------------------------------
    // State transitions
    //-------------------------------------------------------------------------------------

    async fn persist(&self, tokens: &TokenSet) {
        if let Err(e) = self.token_store.save(tokens, self.clock.now()).await {
            warn!("Failed to persist tokens: {}", e);
        }
    }

    fn set_authenticated(&self, tokens: TokenSet, user: User) {
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Ready;
            s.is_loading = false;
            s.user = Some(user);
            s.tokens = Some(tokens);
            s.error = None;
        });
    }

    fn set_unauthenticated(&self, error: Option<String>) {
        self.state.send_replace(Session {
            phase: SessionPhase::Failed,
            error,
            ..Session::empty()
        });
    }
}

fn bearer(id_token: &str) -> String {
    format!("Bearer {}", id_token)
}

fn user_for(tokens: &TokenSet, now: DateTime<Utc>) -> AuthResult<User> {
    let claims = check_token_validity(&tokens.id_token, now)?;
    User::from_claims(&claims)
}

fn accept_persisted(persisted: PersistedTokens, now: DateTime<Utc>) -> AuthResult<(TokenSet, User)> {
    let age = now - persisted.persisted_at;
    if age >= Duration::hours(PERSISTED_MAX_AGE_HOURS) {
        return Err(AuthError::SessionExpired);
    }
    let tokens = persisted.into_token_set();
    let user = user_for(&tokens, now)?;
    Ok((tokens, user))
}

fn diagnose_record(record: &PersistedTokens, now: DateTime<Utc>) -> PersistedDiagnostics {
    let age = now - record.persisted_at;
    let restorable = accept_persisted(record.clone(), now).is_ok();
    match decode_claims(&record.id_token) {
        Ok(claims) => {
            let expires_in_secs = claims.exp.map(|exp| exp - now.timestamp());
            PersistedDiagnostics {
                age,
                has_refresh_token: !record.refresh_token.is_empty(),
                exp: claims.exp,
                expires_in_secs,
                is_expired: expires_in_secs.map_or(true, |secs| secs <= 0),
                restorable,
                decode_error: None,
            }
        }
        Err(e) => PersistedDiagnostics {
            age,
            has_refresh_token: !record.refresh_token.is_empty(),
            exp: None,
            expires_in_secs: None,
            is_expired: true,
            restorable,
            decode_error: Some(e.to_string()),
        },
    }
}
