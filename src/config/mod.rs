//! Configuration
//!
//! - `AppConfig`: credentials, tool server launch settings and store location,
//!   loaded from the environment once per process
//! - `PermissionsConfig`: channel allow-list, admin role and per-category policy

mod app;
mod permissions;

pub use app::{AdyenConfig, AppConfig, LlmConfig, SlackConfig};
pub use permissions::{ActionPolicy, PermissionsConfig, PolicyLevel, RoleDefinition, RolesConfig};
