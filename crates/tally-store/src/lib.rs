//! `RocksDB` storage layer for the tally ledger.
//!
//! Persists accounts, transfers, billing-cycle history, and external
//! payouts using `RocksDB` column families. Transfer records are
//! append-only and doubly indexed (by id and by account), and a
//! transaction's account updates and transfer rows commit in a single
//! atomic `WriteBatch`, so no partial application is observable.
//!
//! # Example
//!
//! ```no_run
//! use tally_store::{RocksStore, Store};
//! use tally_core::{Account, AccountId, AccountOwner, Ledger, UserId};
//!
//! let store = RocksStore::open("/tmp/tally-db").unwrap();
//!
//! let owner = AccountOwner::User(UserId::generate());
//! let account = Account::new(AccountId::generate(), owner, Ledger::Credits);
//! store.put_account(&account).unwrap();
//!
//! let found = store.find_account(&owner, Ledger::Credits).unwrap();
//! assert_eq!(found.map(|a| a.id), Some(account.id));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use tally_core::{
    Account, AccountId, AccountOwner, BillingCycle, ExternalPayout, Ledger, PayoutId,
    PayoutSettlement, TransferId, TransferRecord,
};

/// The storage trait defining all persistence operations.
///
/// Abstracts the storage layer so the engine and jobs can run against
/// different backends. Implementations must make `commit_transaction`
/// atomic; serializing concurrent read-modify-write cycles is the
/// caller's job (the ledger controller holds a write lock).
pub trait Store: Send + Sync {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert or update an account record, maintaining the owner index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Find the unique account for an `(owner, ledger)` pair.
    ///
    /// Always `None` for [`AccountOwner::None`]: system accounts are
    /// addressed by their fixed ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_account(&self, owner: &AccountOwner, ledger: Ledger) -> Result<Option<Account>>;

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Atomically persist a committed transaction: the updated account
    /// rows and the transfer records, all in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; on error,
    /// nothing was written.
    fn commit_transaction(
        &self,
        accounts: &[Account],
        transfers: &[TransferRecord],
    ) -> Result<()>;

    /// Get a transfer record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transfer(&self, transfer_id: &TransferId) -> Result<Option<TransferRecord>>;

    /// List all transfers touching an account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transfers_by_account(&self, account_id: &AccountId) -> Result<Vec<TransferRecord>>;

    // =========================================================================
    // Billing cycles
    // =========================================================================

    /// Append a billing-cycle record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_billing_cycle(&self, cycle: &BillingCycle) -> Result<()>;

    /// The most recent billing cycle, if any has ever run.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_billing_cycle(&self) -> Result<Option<BillingCycle>>;

    // =========================================================================
    // Payouts
    // =========================================================================

    /// Insert an initiated payout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_payout(&self, payout: &ExternalPayout) -> Result<()>;

    /// Get a payout by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_payout(&self, payout_id: &PayoutId) -> Result<Option<ExternalPayout>>;

    /// Settle a payout, moving it to its terminal state.
    ///
    /// Returns the updated record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the payout does not exist.
    /// - [`StoreError::PayoutSettled`] if it was already posted or
    ///   voided; posted and voided are mutually exclusive and final.
    fn settle_payout(
        &self,
        payout_id: &PayoutId,
        settlement: PayoutSettlement,
    ) -> Result<ExternalPayout>;
}
