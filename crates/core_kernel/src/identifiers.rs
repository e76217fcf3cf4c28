//! Strongly-typed identifiers for ledger entities
//!
//! Each identifier is a UUID newtype so a note id can never be passed where an
//! invoice id is expected. The textual form carries a short prefix
//! (`NOTE-…`, `INV-…`); parsing accepts either form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Display prefix, e.g. `NOTE`
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_v7()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Uuid::parse_str(raw).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Property back-office identifiers
define_id!(UnitId, "UNIT");
define_id!(ProjectId, "PRJ");
define_id!(UserId, "USR");
define_id!(OwnerAssociationId, "OWN");

// Ledger identifiers
define_id!(NoteId, "NOTE");
define_id!(ExpenseId, "EXP");
define_id!(InvoiceId, "INV");
define_id!(PaymentId, "PAY");
define_id!(AdvanceId, "ADV");
