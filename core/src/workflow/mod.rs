// fulfillment/src/workflow/mod.rs

pub mod access;
pub mod definition;
pub mod engine;
pub mod sink;

pub use definition::{StatusRule, WorkflowDefinition, WorkflowStep};
pub use engine::{CompletionReport, RepairReport, WorkflowEngine};
pub use sink::{RecordingSink, SideEffectFailure, SideEffectSink, TracingSink};
