//! File-backed approval store
//!
//! One JSON document per pending request, named after its key. Writes land
//! in a temporary file that is renamed into place, and deletion is a single
//! `remove_file`, so every per-key operation is atomic on a local filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::{AssistantError, AssistantResult};

use super::request::ApprovalRequest;
use super::store::{ApprovalStore, StoredApproval};

const RECORD_EXT: &str = "json";

/// Approval store keeping one file per request in a directory
#[derive(Debug, Clone)]
pub struct FileApprovalStore {
    dir: PathBuf,
}

impl FileApprovalStore {
    /// Create a store rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> AssistantResult<PathBuf> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(AssistantError::store(format!("invalid approval key '{}'", id)));
        }
        Ok(self.dir.join(format!("{}.{}", id, RECORD_EXT)))
    }

    async fn read_record(path: &Path) -> AssistantResult<Option<StoredApproval>> {
        match fs::read_to_string(path).await {
            Ok(text) => {
                let stored: StoredApproval = serde_json::from_str(&text).map_err(|e| {
                    AssistantError::store(format!("corrupt record {}: {}", path.display(), e))
                })?;
                Ok(Some(stored))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AssistantError::store(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn remove(path: &Path) -> AssistantResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AssistantError::store(format!(
                "cannot delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl ApprovalStore for FileApprovalStore {
    async fn put(&self, request: &ApprovalRequest) -> AssistantResult<()> {
        let path = self.record_path(&request.id)?;
        let stored = StoredApproval::encode(request)?;
        let json = serde_json::to_vec_pretty(&stored)?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AssistantError::store(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", request.id, uuid::Uuid::new_v4()));
        fs::write(&tmp, &json)
            .await
            .map_err(|e| AssistantError::store(format!("cannot write {}: {}", tmp.display(), e)))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(AssistantError::store(format!(
                "cannot move record into {}: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!("[FileApprovalStore] Stored {}", path.display());
        Ok(())
    }

    async fn get(&self, id: &str) -> AssistantResult<Option<ApprovalRequest>> {
        let path = self.record_path(id)?;
        match Self::read_record(&path).await? {
            Some(stored) => Ok(Some(stored.decode()?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> AssistantResult<bool> {
        let path = self.record_path(id)?;
        Self::remove(&path).await
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> AssistantResult<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(AssistantError::store(format!(
                    "cannot list {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut reaped = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AssistantError::store(format!("cannot list {}: {}", self.dir.display(), e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }

            let stored = match Self::read_record(&path).await {
                Ok(Some(stored)) => stored,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("[FileApprovalStore] Skipping unreadable record: {}", e);
                    continue;
                }
            };

            if now.timestamp() > stored.expires_at && Self::remove(&path).await? {
                tracing::info!("[FileApprovalStore] Reaped expired approval {}", stored.pk);
                reaped += 1;
            }
        }

        Ok(reaped)
    }
}
