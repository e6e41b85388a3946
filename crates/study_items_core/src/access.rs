//! crates/study_items_core/src/access.rs
//!
//! The API access layer: attaches the session's authorization value to each
//! request and replays a request exactly once after a 401 and a token refresh.

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{ItemsPage, StudyItem};
use crate::ports::{PortError, PortResult, StudyItemsApi};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct ApiAccess {
    transport: Arc<dyn StudyItemsApi>,
    session: Arc<SessionManager>,
}

impl ApiAccess {
    pub fn new(transport: Arc<dyn StudyItemsApi>, session: Arc<SessionManager>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub async fn list(&self, cursor: Option<&str>, limit: usize) -> PortResult<ItemsPage> {
        self.authorized(|auth| {
            let transport = self.transport.clone();
            Box::pin(async move { transport.list_items(cursor, limit, auth.as_deref()).await })
        })
        .await
    }

    pub async fn get(&self, id: &str) -> PortResult<StudyItem> {
        self.authorized(|auth| {
            let transport = self.transport.clone();
            Box::pin(async move { transport.get_item(id, auth.as_deref()).await })
        })
        .await
    }

    pub async fn create(&self, topic: &str) -> PortResult<StudyItem> {
        self.authorized(|auth| {
            let transport = self.transport.clone();
            Box::pin(async move { transport.create_item(topic, auth.as_deref()).await })
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> PortResult<()> {
        self.authorized(|auth| {
            let transport = self.transport.clone();
            Box::pin(async move { transport.delete_item(id, auth.as_deref()).await })
        })
        .await
    }

    /// Runs `send` with the authorization value current at send time.
    ///
    /// A 401 triggers one refresh and one replay of this request; a second 401
    /// is returned as `PortError::Unauthorized`. A failed proactive refresh
    /// counts as that one refresh, and nothing is sent.
    async fn authorized<'a, T, F>(&'a self, send: F) -> PortResult<T>
    where
        F: Fn(Option<String>) -> BoxFuture<'a, PortResult<T>>,
    {
        if let Err(e) = self.session.ensure_fresh().await {
            warn!("Proactive token refresh failed: {}", e);
            return Err(PortError::Unauthorized);
        }

        let authorization = self.session.authorization_value();
        match send(authorization.clone()).await {
            Err(PortError::Unauthorized) => {
                warn!("Request rejected with 401; refreshing token and retrying once.");
                let refreshed = self
                    .session
                    .refresh_after_rejection(authorization.as_deref())
                    .await
                    .map_err(|e| {
                        warn!("Token refresh after 401 failed: {}", e);
                        PortError::Unauthorized
                    })?;
                send(Some(refreshed)).await
            }
            other => other,
        }
    }
}
