//! Human sign-off on payment operations
//!
//! An approval request lives in an [`ApprovalStore`] from the moment its
//! prompt is posted until it is resolved or lapses. Resolution deletes the
//! record, and the handler whose delete succeeds is the only one that acts:
//!
//! ```text
//! request_approval ──▶ Requested ──┬─ approve reaction ─▶ Approved
//!                                  ├─ reject reaction ──▶ Rejected
//!                                  └─ past expiry ──────▶ Expired
//! ```

mod file_store;
mod request;
mod store;
mod workflow;

pub use file_store::FileApprovalStore;
pub use request::{format_amount, ApprovalRequest, Decision, Resolution};
pub use store::{ApprovalStore, MemoryApprovalStore, StoredApproval};
pub use workflow::{ApprovalWorkflow, APPROVAL_TTL};
