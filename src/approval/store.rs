//! Approval request persistence
//!
//! The store is the only state shared between invocations. Each operation
//! must be atomic per key; in particular `delete` reports `true` to exactly
//! one caller per stored record, which is what makes resolution at-most-once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::core::{AssistantError, AssistantResult};

use super::request::ApprovalRequest;

/// Durable key-value storage of pending approval requests
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Insert or replace the record keyed by `request.id`
    async fn put(&self, request: &ApprovalRequest) -> AssistantResult<()>;

    /// Fetch a record; `None` if it never existed or was already removed
    async fn get(&self, id: &str) -> AssistantResult<Option<ApprovalRequest>>;

    /// Remove a record.
    ///
    /// Returns `true` only for the caller that actually removed it.
    async fn delete(&self, id: &str) -> AssistantResult<bool>;

    /// Remove every record whose expiry lies before `now`, returning how many
    async fn reap_expired(&self, now: DateTime<Utc>) -> AssistantResult<usize>;
}

/// Persisted row: key, serialized request, and an expiry eviction hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredApproval {
    pub pk: String,
    pub data: String,
    pub expires_at: i64,
}

impl StoredApproval {
    pub fn encode(request: &ApprovalRequest) -> AssistantResult<Self> {
        Ok(Self {
            pk: request.id.clone(),
            data: serde_json::to_string(request)?,
            expires_at: request.expires_at,
        })
    }

    pub fn decode(&self) -> AssistantResult<ApprovalRequest> {
        let request: ApprovalRequest = serde_json::from_str(&self.data)
            .map_err(|e| AssistantError::store(format!("invalid data for {}: {}", self.pk, e)))?;
        if request.id != self.pk {
            return Err(AssistantError::store(format!(
                "record {} holds request {}",
                self.pk, request.id
            )));
        }
        Ok(request)
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    records: Mutex<HashMap<String, ApprovalRequest>>,
}

impl MemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn put(&self, request: &ApprovalRequest) -> AssistantResult<()> {
        self.records
            .lock()
            .await
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> AssistantResult<Option<ApprovalRequest>> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> AssistantResult<bool> {
        Ok(self.records.lock().await.remove(id).is_some())
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> AssistantResult<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, request| !request.is_expired_at(now));
        Ok(before - records.len())
    }
}
