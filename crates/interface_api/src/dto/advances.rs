//! PM advance DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_ledger::PmAdvance;

#[derive(Debug, Deserialize, Validate)]
pub struct IssueAdvanceRequest {
    pub staff_id: Uuid,
    pub project_id: Option<Uuid>,
    pub amount: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectAdvanceRequest {
    pub remaining_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub project_id: Option<Uuid>,
    pub amount: Decimal,
    pub remaining_amount: Decimal,
    pub spent: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PmAdvance> for AdvanceResponse {
    fn from(advance: PmAdvance) -> Self {
        let spent = advance.spent();
        Self {
            id: advance.id.into(),
            staff_id: advance.staff_id.into(),
            project_id: advance.project_id.map(Uuid::from),
            amount: advance.amount,
            remaining_amount: advance.remaining_amount,
            spent,
            notes: advance.notes,
            created_at: advance.created_at,
            updated_at: advance.updated_at,
        }
    }
}
