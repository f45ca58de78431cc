//! # Workflow Events
//!
//! Translates configured workflow trigger definitions into concrete outbound
//! action messages when a state-transition event fires.

pub mod messages_helper;
pub mod triggers;

pub use messages_helper::{ArtifactInfo, WorkflowEventContext, WorkflowEventsMessagesHelper};
pub use triggers::{WorkflowEventAction, WorkflowEventTrigger, WorkflowEventTriggers};
