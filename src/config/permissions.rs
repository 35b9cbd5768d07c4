//! Permission policy configuration
//!
//! Deserialized from JSON shaped like:
//!
//! ```json
//! {
//!   "channels": ["C0123"],
//!   "roles": { "admin": { "users": ["U1"], "groups": ["S1"] } },
//!   "actions": { "refund": { "level": "admin", "approve": true, "maxAmount": 10000 } },
//!   "auditChannel": "C0456"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{AssistantError, AssistantResult};
use crate::permissions::ActionCategory;

/// Who may invoke an action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    /// Anyone in an allowed channel
    Any,
    /// Admins only
    Admin,
}

/// Rule attached to an action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPolicy {
    /// Who may invoke actions in this category
    pub level: PolicyLevel,

    /// Whether a second admin has to sign off
    #[serde(default)]
    pub approve: bool,

    /// Amount in cents at or under which approval is waived (0 = never waived)
    #[serde(default)]
    pub max_amount: u64,
}

impl ActionPolicy {
    /// Anyone, no approval
    pub fn open() -> Self {
        Self {
            level: PolicyLevel::Any,
            approve: false,
            max_amount: 0,
        }
    }

    /// Admins only, no approval
    pub fn admin() -> Self {
        Self {
            level: PolicyLevel::Admin,
            approve: false,
            max_amount: 0,
        }
    }

    /// Admins only, approval above `max_amount` cents (0 = always)
    pub fn admin_with_approval(max_amount: u64) -> Self {
        Self {
            level: PolicyLevel::Admin,
            approve: true,
            max_amount,
        }
    }

    /// Whether an admin invoking this action for `amount` cents needs sign-off.
    ///
    /// The threshold is inclusive: an amount equal to `max_amount` is waived.
    pub fn requires_approval(&self, amount: u64) -> bool {
        if !self.approve {
            return false;
        }
        !(self.max_amount > 0 && amount <= self.max_amount)
    }
}

/// Members of a role: direct user IDs plus user groups resolved at check time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub groups: Vec<String>,
}

/// Role table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub admin: RoleDefinition,
}

/// Full permission policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsConfig {
    /// Channels where the assistant may be used (empty = anywhere)
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub roles: RolesConfig,

    /// Policy per action category
    #[serde(default)]
    pub actions: HashMap<ActionCategory, ActionPolicy>,

    /// Channel receiving audit entries (empty = auditing to chat disabled)
    #[serde(default)]
    pub audit_channel: String,
}

impl PermissionsConfig {
    /// Policy used when nothing is configured
    pub fn default_policy() -> Self {
        Self::default()
            .with_action(ActionCategory::Refund, ActionPolicy::admin_with_approval(10_000))
            .with_action(ActionCategory::Cancel, ActionPolicy::admin_with_approval(0))
            .with_action(ActionCategory::Create, ActionPolicy::admin())
            .with_action(ActionCategory::Read, ActionPolicy::open())
    }

    /// Parse a policy document. Malformed input is a configuration error.
    pub fn from_json(json: &str) -> AssistantResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| AssistantError::config(format!("malformed permissions JSON: {}", e)))
    }

    /// Restrict usage to a channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Add a direct admin
    pub fn with_admin_user(mut self, user: impl Into<String>) -> Self {
        self.roles.admin.users.push(user.into());
        self
    }

    /// Add an admin user group
    pub fn with_admin_group(mut self, group: impl Into<String>) -> Self {
        self.roles.admin.groups.push(group.into());
        self
    }

    /// Set the policy for a category
    pub fn with_action(mut self, category: ActionCategory, policy: ActionPolicy) -> Self {
        self.actions.insert(category, policy);
        self
    }

    /// Set the audit channel
    pub fn with_audit_channel(mut self, channel: impl Into<String>) -> Self {
        self.audit_channel = channel.into();
        self
    }

    /// Configured policy for a category, if any
    pub fn policy(&self, category: ActionCategory) -> Option<&ActionPolicy> {
        self.actions.get(&category)
    }

    /// Audit channel, if one is configured
    pub fn audit_channel(&self) -> Option<&str> {
        let channel = self.audit_channel.trim();
        if channel.is_empty() {
            None
        } else {
            Some(channel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_document() {
        let json = r#"{
            "channels": ["C1"],
            "roles": { "admin": { "users": ["U1", "U2"], "groups": ["S1"] } },
            "actions": {
                "refund": { "level": "admin", "approve": true, "maxAmount": 10000 },
                "read": { "level": "any" }
            },
            "auditChannel": "C9"
        }"#;

        let config = PermissionsConfig::from_json(json).unwrap();
        assert_eq!(config.channels, vec!["C1"]);
        assert_eq!(config.roles.admin.users, vec!["U1", "U2"]);
        assert_eq!(config.roles.admin.groups, vec!["S1"]);
        assert_eq!(
            config.policy(ActionCategory::Refund),
            Some(&ActionPolicy::admin_with_approval(10_000))
        );
        assert_eq!(config.policy(ActionCategory::Read), Some(&ActionPolicy::open()));
        assert_eq!(config.policy(ActionCategory::Cancel), None);
        assert_eq!(config.audit_channel(), Some("C9"));
    }

    #[test]
    fn test_malformed_policy_is_rejected() {
        assert!(PermissionsConfig::from_json("{ not json").is_err());

        // Unknown level
        let err = PermissionsConfig::from_json(r#"{"actions": {"refund": {"level": "owner"}}}"#)
            .unwrap_err();
        assert!(matches!(err, AssistantError::InvalidConfig(_)));

        // Unknown category
        assert!(PermissionsConfig::from_json(r#"{"actions": {"delete": {"level": "any"}}}"#).is_err());
    }

    #[test]
    fn test_empty_audit_channel_is_disabled() {
        let config = PermissionsConfig::from_json(r#"{"auditChannel": ""}"#).unwrap();
        assert_eq!(config.audit_channel(), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = ActionPolicy::admin_with_approval(10_000);
        assert!(!policy.requires_approval(0));
        assert!(!policy.requires_approval(10_000));
        assert!(policy.requires_approval(10_001));
    }

    #[test]
    fn test_zero_threshold_always_requires_approval() {
        let policy = ActionPolicy::admin_with_approval(0);
        assert!(policy.requires_approval(0));
        assert!(policy.requires_approval(1));
        assert!(!ActionPolicy::admin().requires_approval(1_000_000));
    }

    #[test]
    fn test_default_policy() {
        let config = PermissionsConfig::default_policy();
        assert!(config.channels.is_empty());
        assert_eq!(
            config.policy(ActionCategory::Refund),
            Some(&ActionPolicy::admin_with_approval(10_000))
        );
        assert_eq!(
            config.policy(ActionCategory::Cancel),
            Some(&ActionPolicy::admin_with_approval(0))
        );
        assert_eq!(config.policy(ActionCategory::Create), Some(&ActionPolicy::admin()));
        assert_eq!(config.policy(ActionCategory::Read), Some(&ActionPolicy::open()));
    }
}
