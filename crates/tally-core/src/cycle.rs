//! Billing cycle history.

use serde::{Deserialize, Serialize};

use crate::ids::BillingCycleId;

/// An append-only record of when periodic billing last ran.
///
/// The latest cycle anchors the next run's proration. It never gates
/// re-execution: running the job twice in quick succession produces two
/// cycles, each charging a small fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycle {
    /// Unique cycle id.
    pub id: BillingCycleId,

    /// When the cycle ran, epoch milliseconds.
    pub time_ms: i64,
}

impl BillingCycle {
    /// Record a cycle at the given time.
    #[must_use]
    pub fn at(time_ms: i64) -> Self {
        Self {
            id: BillingCycleId::generate(),
            time_ms,
        }
    }
}
