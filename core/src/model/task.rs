// fulfillment/src/model/task.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "task_status", rename_all = "snake_case"))]
pub enum TaskStatus {
  Pending,
  InProgress,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "task_priority", rename_all = "snake_case"))]
pub enum TaskPriority {
  Low,
  #[default]
  Normal,
  High,
  Urgent,
}

/// One unit of fulfillment work for one worker, tied to one order and one
/// workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub id: Uuid,
  pub order_id: Uuid,
  pub order_number: String,
  #[serde(rename = "type")]
  pub task_type: String,
  pub assigned_to: String,
  pub assigned_by: String,
  pub priority: TaskPriority,
  pub status: TaskStatus,
  pub completed_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Task {
  pub fn is_completed(&self) -> bool {
    self.status == TaskStatus::Completed
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
  pub order_id: Uuid,
  pub order_number: String,
  pub task_type: String,
  pub assigned_to: String,
  pub assigned_by: String,
  pub priority: TaskPriority,
  pub created_at: DateTime<Utc>,
}

impl TaskDraft {
  pub fn into_task(self, id: Uuid) -> Task {
    Task {
      id,
      order_id: self.order_id,
      order_number: self.order_number,
      task_type: self.task_type,
      assigned_to: self.assigned_to,
      assigned_by: self.assigned_by,
      priority: self.priority,
      status: TaskStatus::Pending,
      completed_at: None,
      created_at: self.created_at,
      updated_at: self.created_at,
    }
  }
}

/// Partial task update (`PUT /tasks/{id}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
  #[serde(default)]
  pub status: Option<TaskStatus>,
  #[serde(default)]
  pub assigned_to: Option<String>,
  #[serde(default)]
  pub priority: Option<TaskPriority>,
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    self.status.is_none() && self.assigned_to.is_none() && self.priority.is_none()
  }
}
