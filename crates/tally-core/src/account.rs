//! Ledger accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, ContractId, StudioId, UserId};
use crate::ledger::{Ledger, SystemAccount};
use crate::Currency;

/// The owner of an account.
///
/// At most one account exists per `(owner, ledger)` pair. System
/// accounts carry `None` and are addressed by their fixed ids instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AccountOwner {
    /// Owned by a user.
    User(UserId),

    /// Owned by a studio.
    Studio(StudioId),

    /// Owned by a contract.
    Contract(ContractId),

    /// A system account with no owner.
    None,
}

impl AccountOwner {
    /// Whether this is a system account owner.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A balance-holding entity in exactly one ledger.
///
/// Balances are append-only: every change arrives through a committed
/// transfer, and the account keeps running totals of its credit and
/// debit sides rather than a single mutable balance. Pending amounts
/// are reserved but not yet final (two-phase commits); the posted
/// totals are the settled history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account id.
    pub id: AccountId,

    /// Who owns the account, if anyone.
    pub owner: AccountOwner,

    /// The ledger the account lives in.
    pub ledger: Ledger,

    /// The account's currency. Always matches `ledger.currency()`.
    pub currency: Currency,

    /// Sum of all posted credits.
    pub credits_posted: i64,

    /// Sum of all pending (reserved, not yet posted) credits.
    pub credits_pending: i64,

    /// Sum of all posted debits.
    pub debits_posted: i64,

    /// Sum of all pending (reserved, not yet posted) debits.
    pub debits_pending: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new empty account in the given ledger.
    ///
    /// The currency is derived from the ledger, which is what keeps the
    /// currency-matches-ledger invariant true by construction.
    #[must_use]
    pub fn new(id: AccountId, owner: AccountOwner, ledger: Ledger) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner,
            ledger,
            currency: ledger.currency(),
            credits_posted: 0,
            credits_pending: 0,
            debits_posted: 0,
            debits_pending: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create one of the well-known system accounts.
    #[must_use]
    pub fn system(account: SystemAccount) -> Self {
        Self::new(account.account_id(), AccountOwner::None, account.ledger())
    }

    /// The settled balance: posted credits minus posted debits.
    #[must_use]
    pub const fn balance(&self) -> i64 {
        self.credits_posted - self.debits_posted
    }

    /// The usable balance: settled balance minus pending debit
    /// reservations.
    #[must_use]
    pub const fn available(&self) -> i64 {
        self.balance() - self.debits_pending
    }

    /// Apply a posted debit to the running totals.
    pub fn apply_posted_debit(&mut self, amount: i64) {
        self.debits_posted += amount;
        self.updated_at = Utc::now();
    }

    /// Apply a posted credit to the running totals.
    pub fn apply_posted_credit(&mut self, amount: i64) {
        self.credits_posted += amount;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_empty() {
        let account = Account::new(
            AccountId::generate(),
            AccountOwner::User(UserId::generate()),
            Ledger::Credits,
        );
        assert_eq!(account.balance(), 0);
        assert_eq!(account.available(), 0);
        assert_eq!(account.currency, Currency::Credits);
    }

    #[test]
    fn currency_always_matches_ledger() {
        let usd = Account::new(AccountId::generate(), AccountOwner::None, Ledger::Usd);
        assert_eq!(usd.currency, usd.ledger.currency());

        let credits = Account::system(SystemAccount::RevenueRecordsUsageCredits);
        assert_eq!(credits.currency, Currency::Credits);
        assert_eq!(
            credits.id,
            SystemAccount::RevenueRecordsUsageCredits.account_id()
        );
    }

    #[test]
    fn balance_is_posted_credits_minus_posted_debits() {
        let mut account = Account::new(
            AccountId::generate(),
            AccountOwner::User(UserId::generate()),
            Ledger::Credits,
        );
        account.apply_posted_credit(1_500);
        account.apply_posted_debit(400);
        assert_eq!(account.balance(), 1_100);
    }

    #[test]
    fn available_subtracts_pending_debits() {
        let mut account = Account::new(
            AccountId::generate(),
            AccountOwner::User(UserId::generate()),
            Ledger::Credits,
        );
        account.apply_posted_credit(1_000);
        account.debits_pending = 300;
        assert_eq!(account.balance(), 1_000);
        assert_eq!(account.available(), 700);
    }

    #[test]
    fn balance_can_go_negative() {
        let mut account = Account::new(
            AccountId::generate(),
            AccountOwner::Studio(StudioId::generate()),
            Ledger::Credits,
        );
        account.apply_posted_debit(250);
        assert_eq!(account.balance(), -250);
    }
}
