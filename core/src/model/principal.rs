// fulfillment/src/model/principal.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Superuser,
  Admin,
  Worker,
}

impl Role {
  /// Admins and superusers may act on any order or task.
  pub fn is_privileged(self) -> bool {
    matches!(self, Role::Superuser | Role::Admin)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Role::Superuser => "superuser",
      Role::Admin => "admin",
      Role::Worker => "worker",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "superuser" => Ok(Role::Superuser),
      "admin" => Ok(Role::Admin),
      "worker" => Ok(Role::Worker),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

/// The authenticated caller of every back-office operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub id: String,
  pub role: Role,
}

impl Principal {
  pub fn new(id: impl Into<String>, role: Role) -> Self {
    Self { id: id.into(), role }
  }

  pub fn superuser(id: impl Into<String>) -> Self {
    Self::new(id, Role::Superuser)
  }

  pub fn admin(id: impl Into<String>) -> Self {
    Self::new(id, Role::Admin)
  }

  pub fn worker(id: impl Into<String>) -> Self {
    Self::new(id, Role::Worker)
  }

  pub fn is_superuser(&self) -> bool {
    self.role == Role::Superuser
  }
}
