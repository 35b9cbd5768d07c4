//! Action classification
//!
//! Maps tool names exposed by the payment tool server to policy categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy category of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    /// Lookups with no side effects
    Read,
    /// Creates or changes payment objects
    Create,
    /// Moves money back to the shopper
    Refund,
    /// Cancels payments or invalidates links
    Cancel,
}

impl ActionCategory {
    /// Category assumed for tools that are not in the table.
    ///
    /// Unknown tools fall back to the least privileged category, never to a
    /// destructive one.
    pub const DEFAULT: ActionCategory = ActionCategory::Read;

    /// Classify a tool name
    pub fn classify(action: &str) -> Self {
        match action {
            "get_payment_status"
            | "get_payment_details"
            | "list_payment_methods"
            | "list_terminals"
            | "get_terminal_details"
            | "get_webhooks"
            | "list_merchants"
            | "get_merchant_details" => ActionCategory::Read,

            "create_payment_link" | "create_payment_session" | "update_terminal_settings" => {
                ActionCategory::Create
            }

            "refund_payment" => ActionCategory::Refund,

            "cancel_payment" | "expire_payment_link" => ActionCategory::Cancel,

            _ => Self::DEFAULT,
        }
    }

    /// Lowercase name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Read => "read",
            ActionCategory::Create => "create",
            ActionCategory::Refund => "refund",
            ActionCategory::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
