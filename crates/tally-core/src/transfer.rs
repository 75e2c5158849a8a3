//! Transfers: single debit/credit movements of value.
//!
//! A transfer is one leg of a transaction: `amount` leaves the debit
//! account and arrives at the credit account, denominated in one
//! currency. Legs are grouped into transactions and committed
//! atomically by the ledger controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ids::{AccountId, TransactionId, TransferId};
use crate::ledger::Currency;

/// Why a transfer happened.
///
/// Closed enumeration: matching is exhaustive, so a new code is a
/// compile error everywhere it is not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferCode {
    /// Manual credit granted by an administrator.
    AdminCredit,

    /// Usage fee charged against a subscriber's credits.
    RecordsUsageFee,

    /// Revenue sweep converting accumulated usage credits into USD.
    RevenueCreditSweep,

    /// Funds leaving the platform toward an external destination.
    Payout,

    /// Reversal of a voided payout.
    PayoutReversal,
}

/// Which usage dimension a [`TransferCode::RecordsUsageFee`] transfer
/// billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCode {
    /// Fee per instance.
    InstCount,

    /// Fee per kilobyte of instance storage.
    InstBytes,

    /// Fee per file.
    FileCount,

    /// Fee per kilobyte of reserved file storage.
    FileBytes,
}

/// One leg of value movement between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Amount moved, in the currency's scale. Must be positive.
    pub amount: i64,

    /// The account debited.
    pub debit_account: AccountId,

    /// The account credited.
    pub credit_account: AccountId,

    /// Why the value moved.
    pub code: TransferCode,

    /// The currency of the amount. Must match both accounts' ledgers.
    pub currency: Currency,

    /// Usage dimension, for usage-fee transfers.
    pub billing_code: Option<BillingCode>,

    /// When set, this debit bypasses the insufficient-balance check.
    ///
    /// Fees are always collected, even into a negative balance; this is
    /// a policy flag on the transfer, not a property of the account.
    pub balancing_debit: bool,
}

impl Transfer {
    /// Check that the leg is internally well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransfer`] for a non-positive
    /// amount or a self-transfer. Currency-vs-account checks need
    /// account state and live in the ledger controller.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= 0 {
            return Err(LedgerError::InvalidTransfer(format!(
                "transfer amount must be positive, got {}",
                self.amount
            )));
        }
        if self.debit_account == self.credit_account {
            return Err(LedgerError::InvalidTransfer(format!(
                "transfer debits and credits the same account {}",
                self.debit_account
            )));
        }
        Ok(())
    }
}

/// A persisted, immutable transfer leg.
///
/// Records are append-only: once committed they are never modified or
/// deleted, which is what makes account balances an auditable running
/// total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Unique transfer id (ULID, time-ordered).
    pub id: TransferId,

    /// The transaction this leg was committed under.
    pub transaction_id: TransactionId,

    /// The leg as submitted.
    #[serde(flatten)]
    pub transfer: Transfer,

    /// When the leg was committed.
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Materialize a submitted leg under a transaction id.
    #[must_use]
    pub fn new(transaction_id: TransactionId, transfer: Transfer) -> Self {
        Self {
            id: TransferId::generate(),
            transaction_id,
            transfer,
            created_at: Utc::now(),
        }
    }
}
