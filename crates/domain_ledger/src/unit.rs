//! Units and their owner associations
//!
//! Units belong to the surrounding property-management application; the ledger
//! only needs their code (for invoice numbers) and name (for placeholder
//! billing contacts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{OwnerAssociationId, ProjectId, UnitId};

/// A rentable/ownable unit within a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub project_id: Option<ProjectId>,
    /// Short code used in claim invoice numbers, e.g. `A-1204`
    pub code: String,
    pub name: String,
}

impl Unit {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UnitId::new_v7(),
            project_id: None,
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn in_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }
}

/// Billing contact for a unit; exactly one per unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAssociation {
    pub id: OwnerAssociationId,
    pub unit_id: UnitId,
    pub name: String,
    /// Created automatically by the consolidator rather than entered by staff
    pub is_placeholder: bool,
    pub created_at: DateTime<Utc>,
}

impl OwnerAssociation {
    /// Placeholder contact named after the unit, created on the first claim invoice
    pub fn placeholder_for(unit: &Unit) -> Self {
        Self {
            id: OwnerAssociationId::new_v7(),
            unit_id: unit.id,
            name: format!("Owner Association {}", unit.name),
            is_placeholder: true,
            created_at: Utc::now(),
        }
    }
}
