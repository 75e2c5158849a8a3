//! External payouts.
//!
//! A payout tracks money leaving the platform toward an external
//! destination (typically a payment processor). Its lifecycle is a
//! simple terminal-state machine: `initiated -> posted` or
//! `initiated -> voided`; posted and voided are mutually exclusive and
//! final.

use serde::{Deserialize, Serialize};

use crate::ids::{PayoutId, StudioId, TransactionId, TransferId, UserId};

/// Lifecycle state of a payout, derived from its settlement fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Funds reserved, awaiting settlement with the processor.
    Initiated,

    /// Settled successfully. Terminal.
    Posted,

    /// Cancelled and reversed. Terminal.
    Voided,
}

/// A payout to an external destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayout {
    /// Unique payout id.
    pub id: PayoutId,

    /// Invoice this payout settles, if any.
    pub invoice_id: Option<String>,

    /// The user being paid out, if user-owned.
    pub user_id: Option<UserId>,

    /// The studio being paid out, if studio-owned.
    pub studio_id: Option<StudioId>,

    /// The transfer that funded the payout.
    pub transfer_id: TransferId,

    /// The transaction the funding transfer was committed under.
    pub transaction_id: TransactionId,

    /// The processor-side transfer id, once known.
    pub stripe_transfer_id: Option<String>,

    /// Where the money went (processor account reference).
    pub external_destination: String,

    /// Amount paid out, in USD.
    pub amount: i64,

    /// The transfer that finalized a posted payout.
    pub posted_transfer_id: Option<TransferId>,

    /// The reversing transfer of a voided payout.
    pub voided_transfer_id: Option<TransferId>,

    /// When the payout was initiated, epoch milliseconds.
    pub initiated_at_ms: i64,

    /// When the payout was posted, epoch milliseconds.
    pub posted_at_ms: Option<i64>,

    /// When the payout was voided, epoch milliseconds.
    pub voided_at_ms: Option<i64>,
}

impl ExternalPayout {
    /// The current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> PayoutStatus {
        if self.posted_at_ms.is_some() {
            PayoutStatus::Posted
        } else if self.voided_at_ms.is_some() {
            PayoutStatus::Voided
        } else {
            PayoutStatus::Initiated
        }
    }

    /// Whether the payout has reached a terminal state.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self.status(), PayoutStatus::Initiated)
    }
}

/// How a payout was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PayoutSettlement {
    /// The processor confirmed the payout.
    Posted {
        /// The finalizing transfer.
        transfer_id: TransferId,
        /// Settlement time, epoch milliseconds.
        at_ms: i64,
    },

    /// The payout was cancelled and its funds reversed.
    Voided {
        /// The reversing transfer.
        transfer_id: TransferId,
        /// Settlement time, epoch milliseconds.
        at_ms: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payout() -> ExternalPayout {
        ExternalPayout {
            id: PayoutId::generate(),
            invoice_id: None,
            user_id: Some(UserId::generate()),
            studio_id: None,
            transfer_id: TransferId::generate(),
            transaction_id: TransactionId::generate(),
            stripe_transfer_id: None,
            external_destination: "acct_test".to_string(),
            amount: 120,
            posted_transfer_id: None,
            voided_transfer_id: None,
            initiated_at_ms: 1_700_000_000_000,
            posted_at_ms: None,
            voided_at_ms: None,
        }
    }

    #[test]
    fn fresh_payout_is_initiated() {
        let payout = payout();
        assert_eq!(payout.status(), PayoutStatus::Initiated);
        assert!(!payout.is_settled());
    }

    #[test]
    fn posted_payout_is_terminal() {
        let mut payout = payout();
        payout.posted_transfer_id = Some(TransferId::generate());
        payout.posted_at_ms = Some(1_700_000_100_000);
        assert_eq!(payout.status(), PayoutStatus::Posted);
        assert!(payout.is_settled());
    }

    #[test]
    fn voided_payout_is_terminal() {
        let mut payout = payout();
        payout.voided_transfer_id = Some(TransferId::generate());
        payout.voided_at_ms = Some(1_700_000_100_000);
        assert_eq!(payout.status(), PayoutStatus::Voided);
        assert!(payout.is_settled());
    }
}
