//! crates/study_items_core/src/collection.rs
//!
//! Client-side view of the server-paginated study items collection.
//!
//! Pages are fetched with an opaque cursor and appended in server order. At
//! most one page fetch runs at a time, and a generation counter keeps results
//! that arrive after a `refresh` or `close` from touching the new state.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::access::ApiAccess;
use crate::domain::{ItemsPage, SessionPhase, StudyItem};
use crate::ports::PortError;
use crate::session::SessionManager;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("Topic must not be empty")]
    EmptyTopic,
    #[error("Item {0} is not in the collection")]
    NotInCollection(String),
}

impl CollectionError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CollectionError::Port(PortError::Unauthorized))
    }
}

/// A read-only copy of the store's state.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub items: Vec<StudyItem>,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<CollectionError>,
}

struct CollectionState {
    items: Vec<StudyItem>,
    cursor: Option<String>,
    has_more: bool,
    loading: bool,
    loading_more: bool,
    error: Option<CollectionError>,
    generation: u64,
}

impl CollectionState {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            has_more: true,
            loading: false,
            loading_more: false,
            error: None,
            generation: 0,
        }
    }

    /// Clears the view and invalidates any in-flight fetch.
    fn reset(&mut self) {
        self.items.clear();
        self.cursor = None;
        self.has_more = true;
        self.loading = false;
        self.loading_more = false;
        self.error = None;
        self.generation += 1;
    }

    fn apply_page(&mut self, page: ItemsPage, append: bool) {
        if append {
            self.items.extend(page.items);
        } else {
            self.items = page.items;
        }
        self.has_more = page.cursor.is_some();
        self.cursor = page.cursor;
    }
}

pub struct PaginatedStore {
    api: ApiAccess,
    page_size: usize,
    state: Mutex<CollectionState>,
}

impl PaginatedStore {
    pub fn new(api: ApiAccess, page_size: usize) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
            state: Mutex::new(CollectionState::new()),
        }
    }

    fn session(&self) -> &Arc<SessionManager> {
        self.api.session()
    }

    pub async fn snapshot(&self) -> CollectionSnapshot {
        let st = self.state.lock().await;
        CollectionSnapshot {
            items: st.items.clone(),
            cursor: st.cursor.clone(),
            has_more: st.has_more,
            loading: st.loading,
            loading_more: st.loading_more,
            error: st.error.clone(),
        }
    }

    /// Fetches the first page, replacing the current items.
    ///
    /// Waits while the session is initializing. Without an authenticated
    /// session, including one never initialized or torn down, the store
    /// records `Unauthorized` and sends nothing.
    pub async fn load_initial(&self) {
        if self.session().phase() == SessionPhase::Initializing {
            self.session().wait_settled().await;
        }

        let generation = {
            let mut st = self.state.lock().await;
            if !self.session().is_authenticated() {
                debug!("Initial load skipped: not authenticated.");
                st.error = Some(PortError::Unauthorized.into());
                return;
            }
            if st.loading {
                debug!("Initial load already in flight.");
                return;
            }
            st.loading = true;
            st.error = None;
            st.generation
        };

        let result = self.api.list(None, self.page_size).await;

        let mut st = self.state.lock().await;
        if st.generation != generation {
            debug!("Discarding stale initial page.");
            return;
        }
        st.loading = false;
        match result {
            Ok(page) => {
                info!(
                    "Loaded {} study items (more available: {})",
                    page.items.len(),
                    page.cursor.is_some()
                );
                st.apply_page(page, false);
            }
            Err(e) => {
                error!("Failed to load study items: {}", e);
                st.error = Some(e.into());
            }
        }
    }

    /// Fetches the next page and appends it.
    ///
    /// Silently does nothing without a cursor, when nothing more is available,
    /// or while any page fetch is in flight.
    pub async fn load_more(&self) {
        let (cursor, generation) = {
            let mut st = self.state.lock().await;
            let cursor = match (&st.cursor, st.has_more, st.loading || st.loading_more) {
                (Some(cursor), true, false) => cursor.clone(),
                _ => return,
            };
            st.loading_more = true;
            st.error = None;
            (cursor, st.generation)
        };

        let result = self.api.list(Some(&cursor), self.page_size).await;

        let mut st = self.state.lock().await;
        if st.generation != generation {
            debug!("Discarding stale page for cursor.");
            return;
        }
        st.loading_more = false;
        match result {
            Ok(page) => {
                debug!("Appending {} study items", page.items.len());
                st.apply_page(page, true);
            }
            Err(e) => {
                warn!("Failed to load more study items: {}", e);
                st.error = Some(e.into());
            }
        }
    }

    /// Clears the view and loads the first page again.
    pub async fn refresh(&self) {
        self.state.lock().await.reset();
        self.load_initial().await;
    }

    /// Creates a study item and puts it at the top of the list.
    ///
    /// The item keeps whatever status the server returned until a later fetch
    /// observes a change.
    pub async fn create_task(&self, topic: &str) -> Result<StudyItem, CollectionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CollectionError::EmptyTopic);
        }
        self.require_session()?;

        let item = self.api.create(topic).await.map_err(|e| {
            error!("Failed to create study item: {}", e);
            CollectionError::from(e)
        })?;

        let mut st = self.state.lock().await;
        if st.items.iter().any(|existing| existing.id == item.id) {
            debug!("Created item {} already present after a reload.", item.id);
        } else {
            st.items.insert(0, item.clone());
        }
        info!("Created study item {} ({})", item.id, item.status.as_str());
        Ok(item)
    }

    /// Deletes a study item on the server, then drops it from the list.
    ///
    /// Nothing changes locally when the server call fails.
    pub async fn remove_task(&self, id: &str) -> Result<(), CollectionError> {
        self.require_session()?;

        self.api.delete(id).await.map_err(|e| {
            error!("Failed to delete study item {}: {}", id, e);
            CollectionError::from(e)
        })?;

        let mut st = self.state.lock().await;
        match st.items.iter().position(|item| item.id == id) {
            Some(index) => {
                st.items.remove(index);
                info!("Deleted study item {}", id);
                Ok(())
            }
            None => Err(CollectionError::NotInCollection(id.to_string())),
        }
    }

    /// Detaches the store. Results of fetches still in flight are dropped.
    pub async fn close(&self) {
        let mut st = self.state.lock().await;
        st.generation += 1;
        st.loading = false;
        st.loading_more = false;
    }

    fn require_session(&self) -> Result<(), CollectionError> {
        if self.session().is_authenticated() {
            Ok(())
        } else {
            Err(PortError::Unauthorized.into())
        }
    }
}
