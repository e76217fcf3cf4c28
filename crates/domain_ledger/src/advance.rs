//! PM Advance Ledger
//!
//! A PM advance is a cash float issued to a project manager. Conversions
//! funded from it draw it down; nothing ever refunds it. The only way up is an
//! admin correction.
//!
//! The authoritative check is [`reserve`], a conditional decrement evaluated
//! by the store inside the conversion transaction. [`PmAdvanceLedger::precheck`]
//! only gives early feedback before that transaction opens.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::money::{non_negative_amount, positive_amount, round_money};
use core_kernel::{AdvanceId, ProjectId, UserId};

use crate::actor::Actor;
use crate::error::LedgerError;
use crate::ports::{LedgerStore, LedgerTx};

/// A cash float issued to a staff member
///
/// # Invariants
///
/// `0 <= remaining_amount <= amount`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmAdvance {
    pub id: AdvanceId,
    pub staff_id: UserId,
    pub project_id: Option<ProjectId>,
    pub amount: Decimal,
    pub remaining_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PmAdvance {
    /// Issues a new, untouched advance
    pub fn issue(
        staff_id: UserId,
        project_id: Option<ProjectId>,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<Self, LedgerError> {
        let amount = positive_amount(amount)?;
        let now = Utc::now();

        Ok(Self {
            id: AdvanceId::new_v7(),
            staff_id,
            project_id,
            amount,
            remaining_amount: amount,
            notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Amount already drawn down
    pub fn spent(&self) -> Decimal {
        round_money(self.amount - self.remaining_amount)
    }

    /// Fails with `PmAdvanceInsufficient` when the float cannot cover `needed`
    pub fn ensure_covers(&self, needed: Decimal) -> Result<(), LedgerError> {
        if self.remaining_amount >= needed {
            Ok(())
        } else {
            Err(LedgerError::PmAdvanceInsufficient {
                advance_id: self.id,
                remaining: self.remaining_amount,
                needed,
            })
        }
    }
}

/// Atomically draws `amount` from the advance inside `tx`
///
/// When the conditional decrement matches nothing, the advance is re-read in
/// the same transaction only to fill in the error payload.
pub async fn reserve<T: LedgerTx>(
    tx: &mut T,
    advance_id: AdvanceId,
    amount: Decimal,
) -> Result<(), LedgerError> {
    if tx.reserve_advance(advance_id, amount).await? {
        return Ok(());
    }

    match tx.find_advance(advance_id).await? {
        Some(advance) => {
            warn!(
                advance_id = %advance_id,
                remaining = %advance.remaining_amount,
                needed = %amount,
                "PM advance reservation lost to a concurrent draw"
            );
            Err(LedgerError::PmAdvanceInsufficient {
                advance_id,
                remaining: advance.remaining_amount,
                needed: amount,
            })
        }
        None => Err(LedgerError::PmAdvanceNotFound(advance_id)),
    }
}

/// Issues, inspects and corrects PM advances
pub struct PmAdvanceLedger<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for PmAdvanceLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> PmAdvanceLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, advance_id: AdvanceId) -> Result<PmAdvance, LedgerError> {
        self.store
            .get_advance(advance_id)
            .await?
            .ok_or(LedgerError::PmAdvanceNotFound(advance_id))
    }

    /// Non-authoritative check made before a conversion transaction opens
    pub async fn precheck(&self, advance_id: AdvanceId, needed: Decimal) -> Result<PmAdvance, LedgerError> {
        let advance = self.get(advance_id).await?;
        advance.ensure_covers(needed)?;
        Ok(advance)
    }

    /// Issues a new advance to a staff member
    #[instrument(skip(self, notes), fields(staff_id = %staff_id, actor = %actor.id))]
    pub async fn issue(
        &self,
        staff_id: UserId,
        project_id: Option<ProjectId>,
        amount: Decimal,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<PmAdvance, LedgerError> {
        actor.require_ledger_poster("issue PM advances")?;
        let advance = PmAdvance::issue(staff_id, project_id, amount, notes)?;

        let mut tx = self.store.begin().await?;
        tx.insert_advance(&advance).await?;
        tx.commit().await?;

        info!(advance_id = %advance.id, amount = %advance.amount, "PM advance issued");
        Ok(advance)
    }

    /// Admin correction of the remaining balance; the only path that may raise it
    #[instrument(skip(self), fields(advance_id = %advance_id, actor = %actor.id))]
    pub async fn correct(
        &self,
        advance_id: AdvanceId,
        remaining_amount: Decimal,
        actor: &Actor,
    ) -> Result<PmAdvance, LedgerError> {
        actor.require_admin("correct PM advances")?;
        let requested = non_negative_amount(remaining_amount)?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .find_advance(advance_id)
            .await?
            .ok_or(LedgerError::PmAdvanceNotFound(advance_id))?;

        let out_of_range = || LedgerError::InvalidAdvanceCorrection {
            advance_id,
            requested,
            amount: current.amount,
        };
        if requested > current.amount {
            return Err(out_of_range());
        }

        let corrected = tx
            .set_advance_remaining(advance_id, requested)
            .await?
            .ok_or_else(out_of_range)?;
        tx.commit().await?;

        info!(
            from = %current.remaining_amount,
            to = %corrected.remaining_amount,
            "PM advance corrected"
        );
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::InMemoryLedger;
    use rust_decimal_macros::dec;

    fn advance(amount: Decimal) -> PmAdvance {
        PmAdvance::issue(UserId::new(), None, amount, None).unwrap()
    }

    #[test]
    fn test_issue_starts_full() {
        let advance = advance(dec!(500.00));
        assert_eq!(advance.remaining_amount, dec!(500.00));
        assert_eq!(advance.spent(), Decimal::ZERO);
    }

    #[test]
    fn test_issue_rejects_zero() {
        assert!(matches!(
            PmAdvance::issue(UserId::new(), None, Decimal::ZERO, None),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_reserve_decrements_when_covered() {
        let store = Arc::new(InMemoryLedger::new());
        let advance = store.seed_advance(advance(dec!(100.00))).await;

        let mut tx = store.begin().await.unwrap();
        reserve(&mut tx, advance.id, dec!(60.00)).await.unwrap();
        tx.commit().await.unwrap();

        let after = store.get_advance(advance.id).await.unwrap().unwrap();
        assert_eq!(after.remaining_amount, dec!(40.00));
        assert_eq!(after.spent(), dec!(60.00));
    }

    #[tokio::test]
    async fn test_reserve_reports_remaining_when_short() {
        let store = Arc::new(InMemoryLedger::new());
        let advance = store.seed_advance(advance(dec!(50.00))).await;

        let mut tx = store.begin().await.unwrap();
        let err = reserve(&mut tx, advance.id, dec!(80.00)).await.unwrap_err();
        drop(tx);

        match err {
            LedgerError::PmAdvanceInsufficient { remaining, needed, .. } => {
                assert_eq!(remaining, dec!(50.00));
                assert_eq!(needed, dec!(80.00));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let after = store.get_advance(advance.id).await.unwrap().unwrap();
        assert_eq!(after.remaining_amount, dec!(50.00));
    }

    #[tokio::test]
    async fn test_reserve_unknown_advance() {
        let store = Arc::new(InMemoryLedger::new());
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            reserve(&mut tx, AdvanceId::new(), dec!(1.00)).await,
            Err(LedgerError::PmAdvanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_precheck_surfaces_insufficient_funds() {
        let store = Arc::new(InMemoryLedger::new());
        let advance = store.seed_advance(advance(dec!(50.00))).await;
        let ledger = PmAdvanceLedger::new(store);

        assert!(ledger.precheck(advance.id, dec!(50.00)).await.is_ok());
        assert!(matches!(
            ledger.precheck(advance.id, dec!(50.01)).await,
            Err(LedgerError::PmAdvanceInsufficient { .. })
        ));
    }

    #[tokio::test]
    async fn test_correct_is_admin_only_and_bounded() {
        let store = Arc::new(InMemoryLedger::new());
        let mut seeded = advance(dec!(200.00));
        seeded.remaining_amount = dec!(20.00);
        let seeded = store.seed_advance(seeded).await;
        let ledger = PmAdvanceLedger::new(store);

        let accountant = Actor::accountant(UserId::new());
        assert!(matches!(
            ledger.correct(seeded.id, dec!(150.00), &accountant).await,
            Err(LedgerError::Forbidden { .. })
        ));

        let admin = Actor::admin(UserId::new());
        assert!(matches!(
            ledger.correct(seeded.id, dec!(200.01), &admin).await,
            Err(LedgerError::InvalidAdvanceCorrection { .. })
        ));
        assert!(matches!(
            ledger.correct(seeded.id, dec!(-1.00), &admin).await,
            Err(LedgerError::InvalidAmount(_))
        ));

        let corrected = ledger.correct(seeded.id, dec!(150.00), &admin).await.unwrap();
        assert_eq!(corrected.remaining_amount, dec!(150.00));
    }

    #[tokio::test]
    async fn test_issue_persists_advance() {
        let store = Arc::new(InMemoryLedger::new());
        let ledger = PmAdvanceLedger::new(Arc::clone(&store));
        let staff = UserId::new();

        let issued = ledger
            .issue(staff, None, dec!(1000.00), Some("Site float".into()), &Actor::accountant(UserId::new()))
            .await
            .unwrap();

        let stored = ledger.get(issued.id).await.unwrap();
        assert_eq!(stored.staff_id, staff);
        assert_eq!(stored.remaining_amount, dec!(1000.00));
    }
}
