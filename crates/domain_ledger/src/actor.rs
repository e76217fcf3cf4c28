//! The authenticated caller of a ledger operation
//!
//! Authentication happens upstream; the ledger only sees who is acting and in
//! which role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::UserId;

use crate::error::LedgerError;

/// Back-office role of the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Accountant,
    ProjectManager,
    Staff,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "ADMIN",
            ActorRole::Accountant => "ACCOUNTANT",
            ActorRole::ProjectManager => "PROJECT_MANAGER",
            ActorRole::Staff => "STAFF",
        }
    }

    /// Admin and accountant may post to the ledger (convert, reject, pay)
    pub fn can_post_ledger(&self) -> bool {
        matches!(self, ActorRole::Admin | ActorRole::Accountant)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(ActorRole::Admin),
            "ACCOUNTANT" => Ok(ActorRole::Accountant),
            "PROJECT_MANAGER" | "PM" => Ok(ActorRole::ProjectManager),
            "STAFF" => Ok(ActorRole::Staff),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Identity and role of the user performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: UserId, role: ActorRole) -> Self {
        Self { id, role }
    }

    pub fn admin(id: UserId) -> Self {
        Self::new(id, ActorRole::Admin)
    }

    pub fn accountant(id: UserId) -> Self {
        Self::new(id, ActorRole::Accountant)
    }

    /// Fails with `Forbidden` unless the actor is an admin
    pub fn require_admin(&self, action: &'static str) -> Result<(), LedgerError> {
        if self.role == ActorRole::Admin {
            Ok(())
        } else {
            Err(LedgerError::Forbidden { action, role: self.role })
        }
    }

    /// Fails with `Forbidden` unless the actor may post to the ledger
    pub fn require_ledger_poster(&self, action: &'static str) -> Result<(), LedgerError> {
        if self.role.can_post_ledger() {
            Ok(())
        } else {
            Err(LedgerError::Forbidden { action, role: self.role })
        }
    }
}
