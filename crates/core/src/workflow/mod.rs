//! Transaction lifecycle management.
//!
//! # Modules
//!
//! - `types` - The status state machine (TransactionStatus, WorkflowAction)
//! - `service` - Lifecycle operations against a repository

pub mod service;
pub mod types;

#[cfg(test)]
mod types_props;

pub use service::TransactionWorkflow;
pub use types::{InvalidTransition, TransactionStatus, WorkflowAction};
