//! Approval request model

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A pending sign-off on a proposed operation.
///
/// Identified by the timestamp of the prompt message posted to request
/// approval. Records are never updated: resolving one means deleting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Prompt message timestamp, also the store key
    pub id: String,
    pub channel: String,
    /// Thread the prompt was posted into
    pub thread_ts: String,
    pub requested_by: String,
    /// Tool to run once approved
    pub action: String,
    /// Tool arguments, replayed verbatim on approval
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Amount in cents, 0 when not applicable
    #[serde(default)]
    pub amount: u64,
    /// Absolute expiry, unix seconds
    pub expires_at: i64,
    /// Users allowed to resolve the request
    #[serde(default)]
    pub approvers: Vec<String>,
}

impl ApprovalRequest {
    /// Whether `user_id` may approve or reject
    pub fn is_approver(&self, user_id: &str) -> bool {
        self.approvers.iter().any(|a| a == user_id)
    }

    /// Whether the request has lapsed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expires_at
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }
}

/// Terminal decision on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// Interpret a reaction name, with or without surrounding colons.
    ///
    /// Returns `None` for reactions that are neither approve- nor reject-like.
    pub fn from_reaction(reaction: &str) -> Option<Self> {
        let name = reaction.trim();
        let name = name.strip_prefix(':').unwrap_or(name);
        let name = name.strip_suffix(':').unwrap_or(name);

        match name {
            "white_check_mark" | "+1" | "heavy_check_mark" => Some(Decision::Approved),
            "x" | "-1" | "no_entry" => Some(Decision::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request resolved by an eligible approver
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub decision: Decision,
    /// Who reacted
    pub resolved_by: String,
    /// The request as it was persisted
    pub request: ApprovalRequest,
}

/// Format cents for display: `N/A` for 0, otherwise `units.cc`
pub fn format_amount(cents: u64) -> String {
    if cents == 0 {
        return "N/A".to_string();
    }
    format!("{}.{:02}", cents / 100, cents % 100)
}
