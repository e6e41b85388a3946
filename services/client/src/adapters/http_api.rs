//! services/client/src/adapters/http_api.rs
//!
//! This module contains the REST adapter, which is the concrete implementation
//! of the `StudyItemsApi` port from the `core` crate. It handles all interactions
//! with the study items API using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use study_items_core::domain::{ItemsPage, StudyItem, StudyItemStatus};
use study_items_core::ports::{PortError, PortResult, StudyItemsApi};
use tracing::{debug, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements the `StudyItemsApi` port.
#[derive(Clone)]
pub struct HttpTasksAdapter {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpTasksAdapter {
    /// Creates a new `HttpTasksAdapter` for the API rooted at `base_url`.
    pub fn new(http: reqwest::Client, base_url: &str, api_key: impl Into<String>) -> PortResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PortError::Unexpected(format!("invalid API base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PortError::Unexpected(format!("API base URL '{}' cannot hold paths", base_url)));
        }
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// `{base_url}/tasks[/{id}]`, with `id` percent-encoded as one segment.
    fn tasks_url(&self, id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("tasks");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url, authorization: Option<&str>) -> RequestBuilder {
        let request_id = Uuid::new_v4();
        debug!("{} {} (request {}, authorized: {})", method, url.path(), request_id, authorization.is_some());
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("x-api-key", &self.api_key)
            .header("x-request-id", request_id.to_string());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder
    }

    /// Sends the request and maps non-2xx statuses onto `PortError`.
    async fn send(&self, builder: RequestBuilder, resource: &str) -> PortResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Network(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("API answered {} for {}", status, resource);
        Err(match status {
            StatusCode::UNAUTHORIZED => PortError::Unauthorized,
            StatusCode::NOT_FOUND => PortError::NotFound(resource.to_string()),
            _ => PortError::Network(format!("HTTP {}: {}", status.as_u16(), error_message(&body))),
        })
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> PortResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed API response: {}", e)))
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyItemRecord {
    id: String,
    topic: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    content: Option<String>,
}
impl StudyItemRecord {
    fn to_domain(self) -> PortResult<StudyItem> {
        let status = self
            .status
            .parse::<StudyItemStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let updated_at = if self.updated_at < self.created_at {
            warn!("Study item {} was updated before it was created; clamping", self.id);
            self.created_at
        } else {
            self.updated_at
        };
        Ok(StudyItem {
            id: self.id,
            topic: self.topic,
            status,
            created_at: self.created_at,
            updated_at,
            content: self.content,
        })
    }
}

#[derive(Deserialize)]
struct ItemsPageRecord {
    #[serde(default)]
    items: Vec<StudyItemRecord>,
    #[serde(default)]
    cursor: Option<String>,
}
impl ItemsPageRecord {
    fn to_domain(self) -> PortResult<ItemsPage> {
        let items = self
            .items
            .into_iter()
            .map(StudyItemRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(ItemsPage {
            items,
            cursor: self.cursor.filter(|c| !c.is_empty()),
        })
    }
}

#[derive(Deserialize)]
struct ErrorRecord {
    #[serde(alias = "error", alias = "Message")]
    message: Option<String>,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorRecord>(body)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

//=========================================================================================
// `StudyItemsApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyItemsApi for HttpTasksAdapter {
    async fn list_items(
        &self,
        cursor: Option<&str>,
        limit: usize,
        authorization: Option<&str>,
    ) -> PortResult<ItemsPage> {
        let mut url = self.tasks_url(None);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }
        let response = self
            .send(self.request(Method::GET, url, authorization), "tasks")
            .await?;
        Self::decode::<ItemsPageRecord>(response).await?.to_domain()
    }

    async fn get_item(&self, id: &str, authorization: Option<&str>) -> PortResult<StudyItem> {
        let url = self.tasks_url(Some(id));
        let response = self
            .send(self.request(Method::GET, url, authorization), &format!("Study item {}", id))
            .await?;
        Self::decode::<StudyItemRecord>(response).await?.to_domain()
    }

    async fn create_item(&self, topic: &str, authorization: Option<&str>) -> PortResult<StudyItem> {
        let url = self.tasks_url(None);
        let builder = self
            .request(Method::POST, url, authorization)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::json!({ "topic": topic }).to_string());
        let response = self.send(builder, "tasks").await?;
        Self::decode::<StudyItemRecord>(response).await?.to_domain()
    }

    async fn delete_item(&self, id: &str, authorization: Option<&str>) -> PortResult<()> {
        let url = self.tasks_url(Some(id));
        self.send(self.request(Method::DELETE, url, authorization), &format!("Study item {}", id))
            .await?;
        Ok(())
    }
}
