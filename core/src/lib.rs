// src/lib.rs

//! Fulfillment: the order-fulfillment workflow core of a storefront back office.
//!
//! The crate covers the parts of order handling that carry real state:
//!  - Orders and fulfillment tasks behind async store traits.
//!  - A static, injectable workflow definition (packing, quality check, ...).
//!  - A workflow engine that, when a task is completed, creates the next
//!    step's task exactly once and advances the order status.
//!  - A process-wide read cache of the order list with explicit invalidation.
//!  - Discount offer validation and the separate redemption step.
//!
//! Side effects of a task completion are best-effort: they never fail the
//! worker's own write and every swallowed failure goes to a `SideEffectSink`.

pub mod cache;
pub mod error;
pub mod model;
pub mod offers;
pub mod pipeline;
pub mod service;
pub mod store;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::cache::{CacheStatus, InMemoryOrderCache, OrderCache, OrderFilter};
pub use crate::error::{FulfillmentError, FulfillmentResult, PipelineError, StoreError, StoreResult};
pub use crate::model::{
  CustomerRef, NewOffer, NewOrder, Offer, Order, OrderPatch, OrderStatus, Principal, Role, Task, TaskPatch,
  TaskPriority, TaskStatus,
};
pub use crate::offers::{OfferDecision, OfferRejection, OfferValidator, Redemption, ValidateOfferRequest};
pub use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineOutcome, PipelineResult};
pub use crate::service::{FulfillmentConfig, FulfillmentService, FulfillmentStart, OrderListing, Stores, TaskUpdate};
pub use crate::store::{
  MemoryStore, OfferConsumption, OfferStore, OrderStore, RedemptionLedger, TaskInsert, TaskStore,
};
pub use crate::workflow::{
  CompletionReport, RecordingSink, RepairReport, SideEffectFailure, SideEffectSink, TracingSink, WorkflowDefinition,
  WorkflowEngine, WorkflowStep,
};
