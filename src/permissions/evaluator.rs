//! Permission evaluator
//!
//! Decides, per user, channel, action and amount, whether an operation runs
//! immediately, is denied, or has to wait for another admin's sign-off.
//!
//! Rules are applied in order and the first match wins:
//! 1. channel allow-list
//! 2. action classification (unknown → read)
//! 3. category policy (missing → open)
//! 4. open policies are allowed
//! 5. admin check: direct user IDs, then user groups
//! 6. approval threshold

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ActionPolicy, PermissionsConfig, PolicyLevel};
use crate::core::AssistantResult;

use super::classifier::ActionCategory;

/// Reason given when the channel is not on the allow-list
pub const REASON_CHANNEL: &str = "This assistant can only be used in authorized channels.";

/// Reason given when a non-admin invokes an admin action
pub const REASON_ADMIN_REQUIRED: &str = "admin required";

/// Resolves user group membership.
///
/// Every evaluation queries the directory again; results are never cached.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// User IDs belonging to a group
    async fn group_members(&self, group_id: &str) -> AssistantResult<Vec<String>>;
}

/// Outcome of a permission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The action must not run
    Denied { reason: String },
    /// The action may run now
    Allowed,
    /// The action may run once one of `approvers` signs off
    AllowedPendingApproval { approvers: Vec<String> },
}

impl Verdict {
    pub fn denied(reason: impl Into<String>) -> Self {
        Verdict::Denied {
            reason: reason.into(),
        }
    }

    /// Whether the verdict lets the action proceed (now or after approval)
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Verdict::Denied { .. })
    }

    pub fn needs_approval(&self) -> bool {
        matches!(self, Verdict::AllowedPendingApproval { .. })
    }
}

/// Evaluates the permission policy
pub struct PermissionEvaluator {
    config: PermissionsConfig,
    directory: Arc<dyn GroupDirectory>,
}

impl PermissionEvaluator {
    /// Create an evaluator over a policy and a membership directory
    pub fn new(config: PermissionsConfig, directory: Arc<dyn GroupDirectory>) -> Self {
        Self { config, directory }
    }

    /// Evaluate whether `user_id` may run `action` for `amount` cents in `channel_id`
    pub async fn evaluate(
        &self,
        user_id: &str,
        channel_id: &str,
        action: &str,
        amount: u64,
    ) -> Verdict {
        if !self.config.channels.is_empty() && !self.config.channels.iter().any(|c| c == channel_id)
        {
            tracing::info!(
                "[PermissionEvaluator] Denied '{}' for {}: channel {} not allowed",
                action,
                user_id,
                channel_id
            );
            return Verdict::denied(REASON_CHANNEL);
        }

        let category = ActionCategory::classify(action);
        let policy = self.policy_for(category);

        tracing::debug!(
            "[PermissionEvaluator] '{}' classified as {} with {:?}",
            action,
            category,
            policy
        );

        if policy.level == PolicyLevel::Any {
            return Verdict::Allowed;
        }

        if !self.is_admin(user_id).await {
            tracing::info!(
                "[PermissionEvaluator] Denied '{}' for {}: not an admin",
                action,
                user_id
            );
            return Verdict::denied(REASON_ADMIN_REQUIRED);
        }

        if policy.requires_approval(amount) {
            let approvers = self.other_admins(user_id);
            tracing::info!(
                "[PermissionEvaluator] '{}' by {} for {} cents needs approval from {} admin(s)",
                action,
                user_id,
                amount,
                approvers.len()
            );
            return Verdict::AllowedPendingApproval { approvers };
        }

        Verdict::Allowed
    }

    /// Check admin membership: direct user IDs first, then each configured group.
    ///
    /// A failed group lookup counts as "not a member of that group" and the
    /// search continues with the next group.
    pub async fn is_admin(&self, user_id: &str) -> bool {
        let admin = &self.config.roles.admin;

        if admin.users.iter().any(|u| u == user_id) {
            return true;
        }

        for group_id in &admin.groups {
            match self.directory.group_members(group_id).await {
                Ok(members) => {
                    if members.iter().any(|m| m == user_id) {
                        tracing::debug!(
                            "[PermissionEvaluator] {} is an admin via group {}",
                            user_id,
                            group_id
                        );
                        return true;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "[PermissionEvaluator] Membership lookup for group {} failed: {}",
                        group_id,
                        e
                    );
                }
            }
        }

        false
    }

    /// Directly configured admin user IDs
    pub fn admins(&self) -> &[String] {
        &self.config.roles.admin.users
    }

    /// The policy this evaluator works from
    pub fn config(&self) -> &PermissionsConfig {
        &self.config
    }

    fn policy_for(&self, category: ActionCategory) -> ActionPolicy {
        self.config
            .policy(category)
            .copied()
            .unwrap_or_else(ActionPolicy::open)
    }

    /// Configured admins except the requester, in configuration order
    fn other_admins(&self, requester: &str) -> Vec<String> {
        let mut approvers: Vec<String> = Vec::new();
        for user in self.admins() {
            if user != requester && !approvers.contains(user) {
                approvers.push(user.clone());
            }
        }
        approvers
    }
}
