//! services/client/src/cli/state.rs
//!
//! Defines the application's shared state, wired once at startup.

use crate::adapters::{CognitoAdapter, FileTokenStore, HttpTasksAdapter};
use crate::config::Config;
use crate::error::ClientError;
use std::sync::Arc;
use std::time::Duration;
use study_items_core::{ApiAccess, PaginatedStore, SessionManager, SystemClock, TaskDetail};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

//=========================================================================================
// AppState (Shared by every command)
//=========================================================================================

/// The shared application state, created once at startup and passed to all commands.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionManager>,
    pub collection: Arc<PaginatedStore>,
    pub detail: Arc<TaskDetail>,
}

impl AppState {
    /// Builds the adapters and core services described by `config`.
    pub fn build(config: Arc<Config>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("study-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // --- Identity and token storage ---
        let identity = Arc::new(CognitoAdapter::new(
            http.clone(),
            config.cognito_endpoint.clone(),
            config.cognito_client_id.clone(),
        ));
        let token_store = Arc::new(FileTokenStore::new(config.token_store_path.clone()));
        let session = Arc::new(SessionManager::new(identity, token_store, Arc::new(SystemClock)));

        // --- Data access ---
        let transport = Arc::new(HttpTasksAdapter::new(
            http,
            &config.api_base_url,
            config.api_key.clone(),
        )?);
        let access = ApiAccess::new(transport, session.clone());

        Ok(Self {
            collection: Arc::new(PaginatedStore::new(access.clone(), config.page_size)),
            detail: Arc::new(TaskDetail::new(access)),
            session,
            config,
        })
    }
}
