// fulfillment/src/workflow/definition.rs

//! The static, ordered list of fulfillment steps and the pure derivations
//! over it.

use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{OrderStatus, Task};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
  #[serde(rename = "type")]
  pub step_type: String,
  pub label: String,
  pub order: u32,
}

impl WorkflowStep {
  pub fn new(step_type: &str, label: &str, order: u32) -> Self {
    Self {
      step_type: step_type.to_string(),
      label: label.to_string(),
      order,
    }
  }
}

/// A narrow order-status edge fired by completing one specific step while
/// the order sits in one specific status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRule {
  pub step_type: String,
  pub from: OrderStatus,
  pub to: OrderStatus,
}

impl StatusRule {
  pub fn new(step_type: &str, from: OrderStatus, to: OrderStatus) -> Self {
    Self {
      step_type: step_type.to_string(),
      from,
      to,
    }
  }
}

/// Immutable workflow configuration injected into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
  steps: Vec<WorkflowStep>,
  status_rules: Vec<StatusRule>,
  /// Statuses from which "every step completed" advances the order to `Packed`.
  packable_from: Vec<OrderStatus>,
}

impl WorkflowDefinition {
  /// Builds a definition; steps are kept sorted by `order`. Empty
  /// definitions and duplicate types or ranks are rejected.
  pub fn new(mut steps: Vec<WorkflowStep>, status_rules: Vec<StatusRule>) -> FulfillmentResult<Self> {
    if steps.is_empty() {
      return Err(FulfillmentError::Validation("workflow needs at least one step".to_string()));
    }
    steps.sort_by_key(|s| s.order);
    for pair in steps.windows(2) {
      if pair[0].order == pair[1].order {
        return Err(FulfillmentError::Validation(format!(
          "workflow steps '{}' and '{}' share rank {}",
          pair[0].step_type, pair[1].step_type, pair[0].order
        )));
      }
    }
    for (idx, step) in steps.iter().enumerate() {
      if steps[..idx].iter().any(|s| s.step_type == step.step_type) {
        return Err(FulfillmentError::Validation(format!(
          "workflow step type '{}' is declared twice",
          step.step_type
        )));
      }
    }

    Ok(Self {
      steps,
      status_rules,
      packable_from: vec![OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Packing],
    })
  }

  /// packing → quality_check → labeling, with the two point transitions the
  /// back office relies on.
  pub fn standard() -> Self {
    Self {
      steps: vec![
        WorkflowStep::new("packing", "Packing", 1),
        WorkflowStep::new("quality_check", "Quality Check", 2),
        WorkflowStep::new("labeling", "Labeling", 3),
      ],
      status_rules: vec![
        StatusRule::new("packing", OrderStatus::Confirmed, OrderStatus::Processing),
        StatusRule::new("quality_check", OrderStatus::Processing, OrderStatus::Packing),
      ],
      packable_from: vec![OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Packing],
    }
  }

  pub fn steps(&self) -> &[WorkflowStep] {
    &self.steps
  }

  pub fn first_step(&self) -> &WorkflowStep {
    // `new` and `standard` never produce an empty list.
    &self.steps[0]
  }

  pub fn step_by_type(&self, step_type: &str) -> Option<&WorkflowStep> {
    self.steps.iter().find(|s| s.step_type == step_type)
  }

  /// The step with the smallest rank greater than `current_type`'s rank.
  pub fn next_step(&self, current_type: &str) -> Option<&WorkflowStep> {
    let current = self.step_by_type(current_type)?;
    self
      .steps
      .iter()
      .filter(|s| s.order > current.order)
      .min_by_key(|s| s.order)
  }

  pub fn is_step_completed(&self, step_type: &str, tasks: &[Task]) -> bool {
    tasks.iter().any(|t| t.task_type == step_type && t.is_completed())
  }

  pub fn all_steps_completed(&self, tasks: &[Task]) -> bool {
    self.steps.iter().all(|s| self.is_step_completed(&s.step_type, tasks))
  }

  /// Completed steps whose successor task has never been created.
  pub fn missing_successors<'a>(&'a self, tasks: &[Task]) -> Vec<&'a WorkflowStep> {
    self
      .steps
      .iter()
      .filter(|s| self.is_step_completed(&s.step_type, tasks))
      .filter_map(|s| self.next_step(&s.step_type))
      .filter(|next| !tasks.iter().any(|t| t.task_type == next.step_type))
      .collect()
  }

  /// Order status the engine should write after `completed_type` finished,
  /// or `None` to leave the order alone. Never returns a status earlier in
  /// the forward sequence than `current`.
  ///
  /// An order already `Packed` (or later) is left untouched even if a step
  /// added to the definition afterwards becomes satisfied.
  pub fn derive_order_status(&self, completed_type: &str, current: OrderStatus, tasks: &[Task]) -> Option<OrderStatus> {
    let candidate = if self.all_steps_completed(tasks) && self.packable_from.contains(&current) {
      Some(OrderStatus::Packed)
    } else {
      self
        .status_rules
        .iter()
        .find(|rule| rule.step_type == completed_type && rule.from == current)
        .map(|rule| rule.to)
    };

    candidate.filter(|next| current.precedes(*next))
  }
}

impl Default for WorkflowDefinition {
  fn default() -> Self {
    Self::standard()
  }
}
