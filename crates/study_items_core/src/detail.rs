//! crates/study_items_core/src/detail.rs
//!
//! Single study item fetch, independent of the paginated collection.

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::access::ApiAccess;
use crate::domain::StudyItem;
use crate::ports::PortError;

/// Why a detail fetch failed. Not-found is kept apart so callers can show an
/// "item not found" view instead of a generic error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetailError {
    #[error("Study item {0} not found")]
    NotFound(String),
    #[error("Please sign in again")]
    Unauthorized,
    #[error("Failed to load study item: {0}")]
    Network(String),
}

impl DetailError {
    fn from_port(id: &str, e: PortError) -> Self {
        match e {
            PortError::NotFound(_) => DetailError::NotFound(id.to_string()),
            PortError::Unauthorized => DetailError::Unauthorized,
            PortError::Network(msg) | PortError::Unexpected(msg) => DetailError::Network(msg),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailSnapshot {
    pub task_id: Option<String>,
    pub item: Option<StudyItem>,
    pub loading: bool,
    pub error: Option<DetailError>,
}

#[derive(Default)]
struct DetailState {
    view: DetailSnapshot,
    generation: u64,
}

pub struct TaskDetail {
    api: ApiAccess,
    state: Mutex<DetailState>,
}

impl TaskDetail {
    pub fn new(api: ApiAccess) -> Self {
        Self {
            api,
            state: Mutex::new(DetailState::default()),
        }
    }

    pub async fn snapshot(&self) -> DetailSnapshot {
        self.state.lock().await.view.clone()
    }

    /// Loads `id`, replacing whatever item was shown before. A load started
    /// later for another id wins over this one.
    pub async fn load(&self, id: &str) -> Result<StudyItem, DetailError> {
        let generation = {
            let mut st = self.state.lock().await;
            st.generation += 1;
            st.view = DetailSnapshot {
                task_id: Some(id.to_string()),
                item: None,
                loading: true,
                error: None,
            };
            st.generation
        };

        let result = self.api.get(id).await.map_err(|e| DetailError::from_port(id, e));

        let mut st = self.state.lock().await;
        if st.generation != generation {
            debug!("Discarding stale detail response for {}", id);
            return result;
        }
        st.view.loading = false;
        match &result {
            Ok(item) => st.view.item = Some(item.clone()),
            Err(e) => {
                warn!("Detail fetch for {} failed: {}", id, e);
                st.view.error = Some(e.clone());
            }
        }
        result
    }

    /// Loads the current id again, if any.
    pub async fn refetch(&self) -> Option<Result<StudyItem, DetailError>> {
        let id = self.state.lock().await.view.task_id.clone()?;
        Some(self.load(&id).await)
    }

    /// Drops the current view; an in-flight load will not be applied.
    pub async fn close(&self) {
        let mut st = self.state.lock().await;
        st.generation += 1;
        st.view = DetailSnapshot::default();
    }
}
