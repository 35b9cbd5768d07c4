//! Payments assistant
//!
//! A chat assistant that turns requests into payment operations, gated by
//! a permission policy and a human approval step.
//!
//! - [`permissions`]: classify tool calls and decide allow, deny or approve
//! - [`approval`]: park risky calls until another admin reacts, with expiry
//! - [`mcp`]: stdio JSON-RPC bridge to the payment tool server
//! - [`processor`]: drives queued chat events through the above
//! - [`audit`]: records every authorization outcome

pub mod approval;
pub mod audit;
pub mod chat;
pub mod config;
pub mod core;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod permissions;
pub mod processor;
