// storefront/src/db/tasks.rs

use super::{store_error, PgStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::model::{Task, TaskDraft, TaskPriority, TaskStatus};
use fulfillment::{StoreError, StoreResult, TaskInsert, TaskStore};
use tracing::{debug, instrument};
use uuid::Uuid;

const TASK_COLUMNS: &str =
  "id, order_id, order_number, type, assigned_to, assigned_by, priority, status, completed_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TaskRow {
  id: Uuid,
  order_id: Uuid,
  order_number: String,
  #[sqlx(rename = "type")]
  task_type: String,
  assigned_to: String,
  assigned_by: String,
  priority: TaskPriority,
  status: TaskStatus,
  completed_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
  fn from(row: TaskRow) -> Self {
    Task {
      id: row.id,
      order_id: row.order_id,
      order_number: row.order_number,
      task_type: row.task_type,
      assigned_to: row.assigned_to,
      assigned_by: row.assigned_by,
      priority: row.priority,
      status: row.status,
      completed_at: row.completed_at,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[async_trait]
impl TaskStore for PgStore {
  /// The `(order_id, type)` unique key settles concurrent inserts; the
  /// losing insert returns no row.
  #[instrument(
    name = "PgStore::insert_task",
    skip(self, draft),
    fields(order_id = %draft.order_id, task_type = %draft.task_type),
    err(Display)
  )]
  async fn insert_if_absent(&self, draft: TaskDraft) -> StoreResult<TaskInsert> {
    let task = draft.into_task(Uuid::new_v4());
    let row = sqlx::query_as::<_, TaskRow>(&format!(
      "INSERT INTO tasks (id, order_id, order_number, type, assigned_to, assigned_by, priority, status,
         completed_at, created_at, updated_at)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
       ON CONFLICT (order_id, type) DO NOTHING
       RETURNING {}",
      TASK_COLUMNS
    ))
    .bind(task.id)
    .bind(task.order_id)
    .bind(&task.order_number)
    .bind(&task.task_type)
    .bind(&task.assigned_to)
    .bind(&task.assigned_by)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.completed_at)
    .bind(task.created_at)
    .bind(task.updated_at)
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| store_error("task", e))?;

    Ok(match row {
      Some(row) => TaskInsert::Created(row.into()),
      None => {
        debug!("Task already exists for this order and type.");
        TaskInsert::AlreadyExists
      }
    })
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(|e| store_error("task", e))?;
    Ok(row.map(Task::from))
  }

  async fn for_order(&self, order_id: Uuid) -> StoreResult<Vec<Task>> {
    let rows = sqlx::query_as::<_, TaskRow>(&format!(
      "SELECT {} FROM tasks WHERE order_id = $1 ORDER BY created_at",
      TASK_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&self.pool)
    .await
    .map_err(|e| store_error("task", e))?;
    Ok(rows.into_iter().map(Task::from).collect())
  }

  #[instrument(name = "PgStore::update_task", skip(self, task), fields(task_id = %task.id), err(Display))]
  async fn update(&self, task: &Task) -> StoreResult<Task> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
      "UPDATE tasks SET status = $2, assigned_to = $3, priority = $4, completed_at = $5, updated_at = $6
       WHERE id = $1 RETURNING {}",
      TASK_COLUMNS
    ))
    .bind(task.id)
    .bind(task.status)
    .bind(&task.assigned_to)
    .bind(task.priority)
    .bind(task.completed_at)
    .bind(task.updated_at)
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| store_error("task", e))?;
    row.map(Task::from).ok_or_else(|| StoreError::NotFound {
      entity: "task",
      key: task.id.to_string(),
    })
  }

  async fn delete(&self, id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await
      .map_err(|e| store_error("task", e))?;
    Ok(result.rows_affected() > 0)
  }
}
