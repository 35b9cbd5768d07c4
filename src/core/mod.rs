//! Core types shared by every component
//!
//! - `AssistantError` / `AssistantResult` - Error types
//! - `Clock` - Time source for approval expiry

pub mod clock;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AssistantError, AssistantResult};
