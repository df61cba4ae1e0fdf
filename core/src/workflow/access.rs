// fulfillment/src/workflow/access.rs

//! Role and ownership checks. These run in the service layer on every call,
//! independent of whatever the UI already hides.

use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{Order, OrderPatch, Principal, Task, TaskPatch};

pub fn require_superuser(principal: &Principal, action: &str) -> FulfillmentResult<()> {
  if principal.is_superuser() {
    Ok(())
  } else {
    Err(FulfillmentError::Authorization(format!("only a superuser may {}", action)))
  }
}

pub fn require_privileged(principal: &Principal, action: &str) -> FulfillmentResult<()> {
  if principal.role.is_privileged() {
    Ok(())
  } else {
    Err(FulfillmentError::Authorization(format!("only an admin may {}", action)))
  }
}

pub fn can_view_order(principal: &Principal, order: &Order) -> FulfillmentResult<()> {
  if principal.role.is_privileged() || order.assigned_to.as_deref() == Some(principal.id.as_str()) {
    Ok(())
  } else {
    Err(FulfillmentError::Authorization(format!(
      "order {} is not assigned to you",
      order.order_number
    )))
  }
}

pub fn authorize_order_update(principal: &Principal, order: &Order, patch: &OrderPatch) -> FulfillmentResult<()> {
  if let Some(new_assignee) = &patch.assigned_to {
    if new_assignee != &order.assigned_to {
      require_superuser(principal, "reassign an order")?;
    }
  }
  if patch.payment_status.is_some_and(|p| p != order.payment_status) {
    require_privileged(principal, "change payment status")?;
  }
  if patch.status.is_some() && !principal.role.is_privileged() {
    if order.assigned_to.as_deref() != Some(principal.id.as_str()) {
      return Err(FulfillmentError::Authorization(format!(
        "order {} is not assigned to you",
        order.order_number
      )));
    }
  }
  Ok(())
}

pub fn authorize_task_update(principal: &Principal, task: &Task, patch: &TaskPatch) -> FulfillmentResult<()> {
  if patch.assigned_to.as_ref().is_some_and(|a| a != &task.assigned_to) {
    require_superuser(principal, "reassign a task")?;
  }
  if patch.priority.is_some_and(|p| p != task.priority) {
    require_privileged(principal, "change task priority")?;
  }
  if !principal.role.is_privileged() && task.assigned_to != principal.id {
    return Err(FulfillmentError::Authorization(
      "you can only update tasks assigned to you".to_string(),
    ));
  }
  Ok(())
}
