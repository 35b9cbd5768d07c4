//! Queue processor
//!
//! Consumes batches of chat events enqueued by the webhook front end:
//!
//! ```text
//! app_mention / message ──► LLM plan ──► evaluate ──┬─► denied   ──► reply + audit
//!                                                   ├─► approval ──► prompt, park request
//!                                                   └─► allowed  ──► call tool ──► reply + audit
//!
//! reaction_added ──► resolve parked request ──┬─► approved ──► call tool ──► reply + audit
//!                                             ├─► rejected ──► reply + audit
//!                                             └─► expired  ──► reply
//! ```
//!
//! One tool bridge is started per batch and stopped when the batch ends.

mod events;
mod handler;

pub use events::{MessageEvent, QueueMessage, QueuedEvent, ReactionEvent, ReactionItem};
pub use handler::{extract_amount, format_tool_result, BatchReport, Processor, NO_APPROVERS_REPLY};
