// fulfillment/src/pipeline/mod.rs

//! A small async step runner used by the workflow engine.
//!
//! A pipeline is an ordered list of named steps, each with one or more
//! handlers operating on a shared `ContextData<TData>`. Steps marked
//! best-effort do not abort the run when a handler fails: the failure is
//! collected in the returned `PipelineOutcome` and execution continues.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;
pub mod hooks;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineOutcome, PipelineResult, StepFailure};
pub use definition::{Handler, Pipeline};
pub use step::{SkipCondition, StepDef};
