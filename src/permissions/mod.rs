//! Permission system for payment operations
//!
//! Two layers:
//! - **Classifier**: maps a tool name to an [`ActionCategory`]
//! - **Evaluator**: applies the channel allow-list, admin role and the
//!   category policy to produce a [`Verdict`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use payments_assistant::permissions::{PermissionEvaluator, Verdict};
//!
//! let evaluator = PermissionEvaluator::new(config.permissions.clone(), directory);
//!
//! match evaluator.evaluate("U123", "C456", "refund_payment", 15_000).await {
//!     Verdict::Allowed => { /* execute */ }
//!     Verdict::AllowedPendingApproval { approvers } => { /* request sign-off */ }
//!     Verdict::Denied { reason } => { /* reject */ }
//! }
//! ```

mod classifier;
mod evaluator;

pub use classifier::ActionCategory;
pub use evaluator::{
    GroupDirectory, PermissionEvaluator, Verdict, REASON_ADMIN_REQUIRED, REASON_CHANNEL,
};
