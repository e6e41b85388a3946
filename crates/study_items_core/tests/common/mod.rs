#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;

use study_items_core::{
    ApiAccess, AuthError, AuthResult, Clock, CodeDelivery, IdentityProvider, ItemsPage, PaginatedStore,
    PersistedTokens, PortError, PortResult, SessionManager, SignUpOutcome, SignUpRequest, StudyItem,
    StudyItemStatus, StudyItemsApi, TaskDetail, TokenSet, TokenStore,
};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn make_jwt(claims: serde_json::Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"test"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub fn id_token(sub: &str, exp: DateTime<Utc>) -> String {
    make_jwt(serde_json::json!({
        "sub": sub,
        "email": format!("{}@example.com", sub),
        "name": format!("User {}", sub),
        "exp": exp.timestamp(),
    }))
}

pub fn tokens_for(sub: &str, exp: DateTime<Utc>) -> TokenSet {
    TokenSet {
        id_token: id_token(sub, exp),
        access_token: format!("access-{}", sub),
        refresh_token: format!("refresh-{}", sub),
        issued_at: start_time(),
    }
}

/// A token set valid for an hour after `start_time()`.
pub fn valid_tokens(sub: &str) -> TokenSet {
    tokens_for(sub, start_time() + Duration::hours(1))
}

// ---------------------------------------------------------------------------
// Mock: Clock
// ---------------------------------------------------------------------------

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Mock: IdentityProvider
// ---------------------------------------------------------------------------

pub struct MockIdentity {
    pub current: Mutex<AuthResult<Option<TokenSet>>>,
    pub sign_in_result: Mutex<AuthResult<TokenSet>>,
    pub refresh_result: Mutex<AuthResult<TokenSet>>,
    pub sign_out_result: Mutex<AuthResult<()>>,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub sign_up_calls: AtomicUsize,
    /// When set, session queries wait for a notification before answering.
    pub current_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockIdentity {
    pub fn gate_current_session(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.current_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self {
            current: Mutex::new(Ok(None)),
            sign_in_result: Mutex::new(Ok(valid_tokens("alice"))),
            refresh_result: Mutex::new(Err(AuthError::SessionExpired)),
            sign_out_result: Mutex::new(Ok(())),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            sign_up_calls: AtomicUsize::new(0),
            current_gate: Mutex::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn current_session(&self) -> AuthResult<Option<TokenSet>> {
        let gate = self.current_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.current.lock().unwrap().clone()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> AuthResult<TokenSet> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_in_result.lock().unwrap().clone()
    }

    async fn sign_out(&self, _access_token: Option<&str>) -> AuthResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_out_result.lock().unwrap().clone()
    }

    async fn refresh(&self, _refresh_token: &str) -> AuthResult<TokenSet> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result.lock().unwrap().clone()
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SignUpOutcome {
            user_sub: format!("sub-{}", request.email),
            needs_confirmation: true,
            delivery: Some(CodeDelivery {
                destination: Some("a***@example.com".to_string()),
                medium: Some("EMAIL".to_string()),
            }),
        })
    }

    async fn confirm_sign_up(&self, _email: &str, code: &str) -> AuthResult<()> {
        if code == "123456" {
            Ok(())
        } else {
            Err(AuthError::Rejected("Invalid verification code provided".to_string()))
        }
    }

    async fn resend_confirmation_code(&self, _email: &str) -> AuthResult<CodeDelivery> {
        Ok(CodeDelivery {
            destination: None,
            medium: Some("EMAIL".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Mock: TokenStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockTokenStore {
    pub record: Mutex<Option<PersistedTokens>>,
    pub saves: AtomicUsize,
    pub clears: AtomicUsize,
}

impl MockTokenStore {
    pub fn with_record(tokens: &TokenSet, persisted_at: DateTime<Utc>) -> Self {
        let store = Self::default();
        *store.record.lock().unwrap() = Some(PersistedTokens {
            id_token: tokens.id_token.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            persisted_at,
        });
        store
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn load(&self) -> PortResult<Option<PersistedTokens>> {
        Ok(self.record.lock().unwrap().clone())
    }

    async fn save(&self, tokens: &TokenSet, persisted_at: DateTime<Utc>) -> PortResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.record.lock().unwrap() = Some(PersistedTokens {
            id_token: tokens.id_token.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            persisted_at,
        });
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.record.lock().unwrap() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock: StudyItemsApi (in-memory server)
// ---------------------------------------------------------------------------

pub fn item(id: &str, topic: &str) -> StudyItem {
    StudyItem {
        id: id.to_string(),
        topic: topic.to_string(),
        status: StudyItemStatus::Done,
        created_at: start_time(),
        updated_at: start_time(),
        content: None,
    }
}

#[derive(Default)]
pub struct MockApi {
    pub items: Mutex<Vec<StudyItem>>,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    /// Every authorization value the server saw, in order.
    pub seen_auth: Mutex<Vec<Option<String>>>,
    /// When set, only this authorization value is accepted.
    pub accepted_auth: Mutex<Option<String>>,
    /// The next N calls answer 401.
    pub reject_next: AtomicUsize,
    /// The next N calls fail with a network error.
    pub fail_next: AtomicUsize,
    /// When set, list calls wait for a notification before answering.
    pub list_gate: Mutex<Option<Arc<Notify>>>,
    next_id: AtomicUsize,
}

impl MockApi {
    pub fn with_items(count: usize) -> Self {
        let api = Self::default();
        *api.items.lock().unwrap() = (0..count)
            .map(|i| item(&format!("task-{:02}", i), &format!("Topic {}", i)))
            .collect();
        api
    }

    pub fn gate_lists(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn check(&self, authorization: Option<&str>) -> PortResult<()> {
        self.seen_auth.lock().unwrap().push(authorization.map(str::to_string));
        if take_one(&self.fail_next) {
            return Err(PortError::Network("HTTP 503: unavailable".to_string()));
        }
        if take_one(&self.reject_next) {
            return Err(PortError::Unauthorized);
        }
        let accepted = self.accepted_auth.lock().unwrap().clone();
        match (accepted, authorization) {
            (_, None) => Err(PortError::Unauthorized),
            (Some(expected), Some(actual)) if expected != actual => Err(PortError::Unauthorized),
            _ => Ok(()),
        }
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl StudyItemsApi for MockApi {
    async fn list_items(
        &self,
        cursor: Option<&str>,
        limit: usize,
        authorization: Option<&str>,
    ) -> PortResult<ItemsPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check(authorization)?;

        let items = self.items.lock().unwrap();
        let start = match cursor {
            Some(c) => c
                .strip_prefix("offset:")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| PortError::Unexpected(format!("bad cursor {}", c)))?,
            None => 0,
        };
        let end = (start + limit).min(items.len());
        Ok(ItemsPage {
            items: items[start.min(end)..end].to_vec(),
            cursor: (end < items.len()).then(|| format!("offset:{}", end)),
        })
    }

    async fn get_item(&self, id: &str, authorization: Option<&str>) -> PortResult<StudyItem> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check(authorization)?;
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .map(|i| StudyItem {
                content: Some(format!("# {}", i.topic)),
                ..i.clone()
            })
            .ok_or_else(|| PortError::NotFound(id.to_string()))
    }

    async fn create_item(&self, topic: &str, authorization: Option<&str>) -> PortResult<StudyItem> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check(authorization)?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = StudyItem {
            status: StudyItemStatus::Queued,
            ..item(&format!("new-{}", n), topic)
        };
        self.items.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn delete_item(&self, id: &str, authorization: Option<&str>) -> PortResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check(authorization)?;
        let mut items = self.items.lock().unwrap();
        let index = items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| PortError::NotFound(id.to_string()))?;
        items.remove(index);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub identity: Arc<MockIdentity>,
    pub store: Arc<MockTokenStore>,
    pub api: Arc<MockApi>,
    pub clock: Arc<FixedClock>,
    pub session: Arc<SessionManager>,
}

impl Harness {
    pub fn new(identity: MockIdentity, store: MockTokenStore, api: MockApi) -> Self {
        let identity = Arc::new(identity);
        let store = Arc::new(store);
        let api = Arc::new(api);
        let clock = Arc::new(FixedClock::new(start_time()));
        let session = Arc::new(SessionManager::new(identity.clone(), store.clone(), clock.clone()));
        Self {
            identity,
            store,
            api,
            clock,
            session,
        }
    }

    /// A harness whose identity provider already holds a session for "alice".
    pub fn signed_in(api: MockApi) -> Self {
        let identity = MockIdentity::default();
        *identity.current.lock().unwrap() = Ok(Some(valid_tokens("alice")));
        Self::new(identity, MockTokenStore::default(), api)
    }

    pub fn access(&self) -> ApiAccess {
        ApiAccess::new(self.api.clone(), self.session.clone())
    }

    pub fn collection(&self, page_size: usize) -> Arc<PaginatedStore> {
        Arc::new(PaginatedStore::new(self.access(), page_size))
    }

    pub fn detail(&self) -> TaskDetail {
        TaskDetail::new(self.access())
    }
}

/// Yields until `counter` reaches `target`.
pub async fn wait_for_count(counter: &AtomicUsize, target: usize) {
    while counter.load(Ordering::SeqCst) < target {
        tokio::task::yield_now().await;
    }
}
