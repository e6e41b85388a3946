//! services/client/src/adapters/token_file.rs
//!
//! Durable token storage in a single JSON file.
//!
//! Writes go to a sibling temporary file that is renamed over the record, so a
//! crash mid-write leaves either the old record or the new one. Records that
//! cannot be parsed are deleted on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use study_items_core::domain::{PersistedTokens, TokenSet};
use study_items_core::ports::{PortError, PortResult, TokenStore};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "auth_tokens.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn discard(&self, reason: &str) {
        warn!("Discarding unreadable token record at {}: {}", self.path.display(), reason);
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove token record: {}", e);
            }
        }
    }
}

//=========================================================================================
// On-disk Record
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRecord {
    id_token: String,
    access_token: String,
    refresh_token: String,
    /// Milliseconds since the epoch at which the record was written.
    timestamp: i64,
}
impl TokenRecord {
    fn to_domain(self) -> Option<PersistedTokens> {
        if self.id_token.is_empty() {
            return None;
        }
        Some(PersistedTokens {
            persisted_at: DateTime::from_timestamp_millis(self.timestamp)?,
            id_token: self.id_token,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        })
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("failed to {} {}: {}", action, path.display(), e))
}

//=========================================================================================
// `TokenStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> PortResult<Option<PersistedTokens>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &self.path, e)),
        };

        match serde_json::from_slice::<TokenRecord>(&bytes) {
            Ok(record) => match record.to_domain() {
                Some(tokens) => Ok(Some(tokens)),
                None => {
                    self.discard("record has no usable token or timestamp").await;
                    Ok(None)
                }
            },
            Err(e) => {
                self.discard(&e.to_string()).await;
                Ok(None)
            }
        }
    }

    async fn save(&self, tokens: &TokenSet, persisted_at: DateTime<Utc>) -> PortResult<()> {
        let record = TokenRecord {
            id_token: tokens.id_token.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            timestamp: persisted_at.timestamp_millis(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| PortError::Unexpected(format!("failed to encode token record: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create", parent, e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| io_error("write", &temp, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| io_error("restrict", &temp, e))?;
        }

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| io_error("replace", &self.path, e))?;
        debug!("Persisted tokens to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &self.path, e)),
        }
    }
}
