//! Pre-built Test Fixtures
//!
//! Fixed, predictable ledger data for unit tests.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ProjectId, UserId};
use domain_ledger::{Actor, ActorRole, Unit};

/// Units used across tests
pub struct UnitFixtures;

impl UnitFixtures {
    /// Tower A, floor 12, unit 04
    pub fn tower_a_1204() -> Unit {
        Unit::new("A-1204", "Tower A 12-04")
    }

    /// A second unit for cross-unit isolation checks
    pub fn tower_b_0301() -> Unit {
        Unit::new("B-0301", "Tower B 03-01")
    }

    pub fn in_project(project_id: ProjectId) -> Unit {
        Self::tower_a_1204().in_project(project_id)
    }
}

/// Amounts that exercise the rounding and tolerance rules
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn repair() -> Decimal {
        dec!(250.00)
    }

    pub fn small_repair() -> Decimal {
        dec!(100.00)
    }

    /// Rounds up to 150.00 with midpoint-away-from-zero
    pub fn midpoint() -> Decimal {
        dec!(149.995)
    }

    /// Exactly the paid tolerance
    pub fn tolerance() -> Decimal {
        core_kernel::PAID_TOLERANCE
    }

    pub fn advance_float() -> Decimal {
        dec!(500.00)
    }
}

/// Timestamps for ordering tests
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Start of the ledger year
    pub fn year_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    /// `minutes` after [`TemporalFixtures::year_start`]
    pub fn minutes_later(minutes: i64) -> DateTime<Utc> {
        Self::year_start() + chrono::Duration::minutes(minutes)
    }
}

/// Actors for each role
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn admin() -> Actor {
        Actor::admin(UserId::new())
    }

    pub fn accountant() -> Actor {
        Actor::accountant(UserId::new())
    }

    pub fn project_manager() -> Actor {
        Actor::new(UserId::new(), ActorRole::ProjectManager)
    }

    pub fn staff() -> Actor {
        Actor::new(UserId::new(), ActorRole::Staff)
    }
}
