// fulfillment/src/workflow/engine.rs

//! Task-completion automation.
//!
//! Completing a task runs a three-step pipeline:
//!  - `resolve_step`: find the completed task's workflow step and its successor.
//!  - `ensure_next_task`: create the successor task unless it already exists.
//!  - `sync_order_status`: re-derive the order status from the task set.
//!
//! The last two are best-effort. Their failures go to the side-effect sink
//! and never reach the caller whose task update triggered them; the
//! `repair` pass re-runs the same pipeline to close any gap left behind.

use crate::cache::OrderCache;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{Order, OrderStatus, Principal, Task, TaskDraft, TaskPriority};
use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineOutcome, SkipCondition};
use crate::store::{OrderStore, TaskInsert, TaskStore};
use crate::workflow::definition::{WorkflowDefinition, WorkflowStep};
use crate::workflow::sink::{SideEffectFailure, SideEffectSink};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub(crate) const STEP_RESOLVE: &str = "resolve_step";
pub(crate) const STEP_NEXT_TASK: &str = "ensure_next_task";
pub(crate) const STEP_ORDER_STATUS: &str = "sync_order_status";

/// Shared state of one completion run.
#[derive(Debug, Clone)]
struct CompletionCtx {
  completed: Task,
  actor: Principal,
  next_step: Option<WorkflowStep>,
  created_task: Option<Task>,
  status_change: Option<(OrderStatus, OrderStatus)>,
}

/// What the automation did after one task completed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionReport {
  pub created_task: Option<Task>,
  pub status_change: Option<(OrderStatus, OrderStatus)>,
  pub failures: Vec<SideEffectFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
  pub order_id: Uuid,
  pub created_tasks: Vec<Task>,
  pub final_status: OrderStatus,
  pub failures: Vec<SideEffectFailure>,
}

pub struct WorkflowEngine {
  definition: Arc<WorkflowDefinition>,
  orders: Arc<dyn OrderStore>,
  tasks: Arc<dyn TaskStore>,
  sink: Arc<dyn SideEffectSink>,
  completion: Pipeline<CompletionCtx, FulfillmentError>,
}

impl WorkflowEngine {
  pub fn new(
    definition: WorkflowDefinition,
    orders: Arc<dyn OrderStore>,
    tasks: Arc<dyn TaskStore>,
    cache: Arc<dyn OrderCache>,
    sink: Arc<dyn SideEffectSink>,
  ) -> Self {
    let definition = Arc::new(definition);
    let completion = build_completion_pipeline(&definition, &orders, &tasks, &cache);
    Self {
      definition,
      orders,
      tasks,
      sink,
      completion,
    }
  }

  pub fn definition(&self) -> &WorkflowDefinition {
    &self.definition
  }

  /// Creates the first step's task for `order`, assigned to `assignee`.
  /// Returns the existing task when the order already has one of that type.
  #[instrument(name = "WorkflowEngine::start", skip(self, order, actor), fields(order_id = %order.id), err(Display))]
  pub async fn start(
    &self,
    order: &Order,
    assignee: &str,
    priority: TaskPriority,
    actor: &Principal,
  ) -> FulfillmentResult<Task> {
    let first = self.definition.first_step();
    let draft = TaskDraft {
      order_id: order.id,
      order_number: order.order_number.clone(),
      task_type: first.step_type.clone(),
      assigned_to: assignee.to_string(),
      assigned_by: actor.id.clone(),
      priority,
      created_at: Utc::now(),
    };
    match self.tasks.insert_if_absent(draft).await? {
      TaskInsert::Created(task) => {
        info!(task_id = %task.id, step = %task.task_type, "Fulfillment started.");
        Ok(task)
      }
      TaskInsert::AlreadyExists => self
        .tasks
        .for_order(order.id)
        .await?
        .into_iter()
        .find(|t| t.task_type == first.step_type)
        .ok_or_else(|| FulfillmentError::Conflict(format!("task '{}' exists but could not be read", first.step_type))),
    }
  }

  /// Runs the completion automation for a task that just crossed into
  /// `completed`. Never fails; see the module docs.
  #[instrument(
    name = "WorkflowEngine::on_task_completed",
    skip(self, task, actor),
    fields(order_id = %task.order_id, task_id = %task.id, step = %task.task_type)
  )]
  pub async fn on_task_completed(&self, task: &Task, actor: &Principal) -> CompletionReport {
    let ctx = ContextData::new(CompletionCtx {
      completed: task.clone(),
      actor: actor.clone(),
      next_step: None,
      created_task: None,
      status_change: None,
    });

    let failures = match self.completion.run(ctx.clone()).await {
      Ok(outcome) => self.report_failures(task, outcome),
      Err(e) => {
        let failure = SideEffectFailure {
          order_id: task.order_id,
          task_id: Some(task.id),
          step: STEP_RESOLVE.to_string(),
          error: e.to_string(),
        };
        self.sink.record(failure.clone());
        vec![failure]
      }
    };

    let final_ctx = ctx.snapshot();
    CompletionReport {
      created_task: final_ctx.created_task,
      status_change: final_ctx.status_change,
      failures,
    }
  }

  /// Re-runs the completion automation for every completed task of the
  /// order, in workflow order. Idempotent.
  #[instrument(name = "WorkflowEngine::repair", skip(self, actor), err(Display))]
  pub async fn repair(&self, order_id: Uuid, actor: &Principal) -> FulfillmentResult<RepairReport> {
    if self.orders.get(order_id).await?.is_none() {
      return Err(FulfillmentError::NotFound(format!("order '{}'", order_id)));
    }
    let tasks = self.tasks.for_order(order_id).await?;
    let gaps = self.definition.missing_successors(&tasks).len();
    debug!(gaps, "Repairing order workflow.");

    let mut created_tasks = Vec::new();
    let mut failures = Vec::new();
    for step in self.definition.steps() {
      let completed = tasks.iter().find(|t| t.task_type == step.step_type && t.is_completed());
      if let Some(task) = completed {
        let report = self.on_task_completed(task, actor).await;
        created_tasks.extend(report.created_task);
        failures.extend(report.failures);
      }
    }

    let final_status = self
      .orders
      .get(order_id)
      .await?
      .map(|o| o.status)
      .ok_or_else(|| FulfillmentError::NotFound(format!("order '{}'", order_id)))?;

    info!(created = created_tasks.len(), failures = failures.len(), status = %final_status, "Repair finished.");
    Ok(RepairReport {
      order_id,
      created_tasks,
      final_status,
      failures,
    })
  }

  fn report_failures(&self, task: &Task, outcome: PipelineOutcome) -> Vec<SideEffectFailure> {
    outcome
      .failures
      .into_iter()
      .map(|f| {
        let failure = SideEffectFailure {
          order_id: task.order_id,
          task_id: Some(task.id),
          step: f.step,
          error: f.message,
        };
        self.sink.record(failure.clone());
        failure
      })
      .collect()
  }
}

fn build_completion_pipeline(
  definition: &Arc<WorkflowDefinition>,
  orders: &Arc<dyn OrderStore>,
  tasks: &Arc<dyn TaskStore>,
  cache: &Arc<dyn OrderCache>,
) -> Pipeline<CompletionCtx, FulfillmentError> {
  let no_successor: SkipCondition<CompletionCtx> = Arc::new(|c: &CompletionCtx| c.next_step.is_none());
  let mut p = Pipeline::<CompletionCtx, FulfillmentError>::new(
    "task_completion",
    &[
      (STEP_RESOLVE, false, None),
      (STEP_NEXT_TASK, true, Some(no_successor)),
      (STEP_ORDER_STATUS, true, None),
    ],
  );

  let def = Arc::clone(definition);
  p.on_root(STEP_RESOLVE, move |ctx| resolve_step(Arc::clone(&def), ctx));

  let task_store = Arc::clone(tasks);
  p.on_root(STEP_NEXT_TASK, move |ctx| ensure_next_task(Arc::clone(&task_store), ctx));

  let status = StatusSync {
    definition: Arc::clone(definition),
    orders: Arc::clone(orders),
    tasks: Arc::clone(tasks),
    cache: Arc::clone(cache),
  };
  p.on_root(STEP_ORDER_STATUS, move |ctx| status.clone().run(ctx));

  p
}

async fn resolve_step(
  definition: Arc<WorkflowDefinition>,
  ctx: ContextData<CompletionCtx>,
) -> FulfillmentResult<PipelineControl> {
  let mut guard = ctx.write();
  let step_type = guard.completed.task_type.clone();
  if definition.step_by_type(&step_type).is_none() {
    debug!(step = %step_type, "Task type is not part of the workflow; no automation.");
    return Ok(PipelineControl::Stop);
  }
  guard.next_step = definition.next_step(&step_type).cloned();
  Ok(PipelineControl::Continue)
}

async fn ensure_next_task(
  tasks: Arc<dyn TaskStore>,
  ctx: ContextData<CompletionCtx>,
) -> FulfillmentResult<PipelineControl> {
  let (completed, actor_id, next) = {
    let guard = ctx.read();
    let next = guard
      .next_step
      .clone()
      .ok_or_else(|| FulfillmentError::Internal("next step missing".to_string()))?;
    (guard.completed.clone(), guard.actor.id.clone(), next)
  };

  let existing = tasks.for_order(completed.order_id).await?;
  if existing.iter().any(|t| t.task_type == next.step_type) {
    debug!(next = %next.step_type, "Successor task already present.");
    return Ok(PipelineControl::Continue);
  }

  // The same worker carries the chain forward.
  let draft = TaskDraft {
    order_id: completed.order_id,
    order_number: completed.order_number.clone(),
    task_type: next.step_type.clone(),
    assigned_to: completed.assigned_to.clone(),
    assigned_by: actor_id,
    priority: completed.priority,
    created_at: Utc::now(),
  };
  match tasks.insert_if_absent(draft).await? {
    TaskInsert::Created(task) => {
      info!(task_id = %task.id, next = %task.task_type, assignee = %task.assigned_to, "Created successor task.");
      ctx.write().created_task = Some(task);
    }
    TaskInsert::AlreadyExists => {
      debug!(next = %next.step_type, "Successor task created concurrently; nothing to do.");
    }
  }
  Ok(PipelineControl::Continue)
}

#[derive(Clone)]
struct StatusSync {
  definition: Arc<WorkflowDefinition>,
  orders: Arc<dyn OrderStore>,
  tasks: Arc<dyn TaskStore>,
  cache: Arc<dyn OrderCache>,
}

impl StatusSync {
  async fn run(self, ctx: ContextData<CompletionCtx>) -> FulfillmentResult<PipelineControl> {
    let (order_id, step_type) = {
      let guard = ctx.read();
      (guard.completed.order_id, guard.completed.task_type.clone())
    };

    let order = self
      .orders
      .get(order_id)
      .await?
      .ok_or_else(|| FulfillmentError::NotFound(format!("order '{}'", order_id)))?;
    let tasks = self.tasks.for_order(order_id).await?;

    let previous = order.status;
    let Some(next_status) = self.definition.derive_order_status(&step_type, previous, &tasks) else {
      return Ok(PipelineControl::Continue);
    };

    // Guarded on the status read above; a concurrent write wins.
    let moved = self
      .orders
      .transition_status(order_id, previous, next_status, Utc::now())
      .await?;
    if moved.is_none() {
      debug!(from = %previous, to = %next_status, "Order status changed concurrently; leaving it alone.");
      return Ok(PipelineControl::Continue);
    }
    self.cache.invalidate();
    info!(from = %previous, to = %next_status, "Order status advanced by workflow.");
    ctx.write().status_change = Some((previous, next_status));
    Ok(PipelineControl::Continue)
  }
}
