//! Core types for the tally ledger and billing engine.
//!
//! This crate defines the foundational model shared by the store, the
//! transfer engine, and the billing jobs:
//!
//! - **Ledgers**: `Ledger`, `Currency`, `convert_between_ledgers`
//! - **Accounts**: `Account`, `AccountOwner`, the `SystemAccount` table
//! - **Transfers**: `Transfer`, `TransferCode`, `BillingCode`,
//!   `TransferRecord`
//! - **Payouts**: `ExternalPayout`, `PayoutSettlement`
//! - **Identifiers**: UUID-backed entity ids, ULID-backed record ids
//!
//! # Amount representation
//!
//! All amounts are `i64` integers in their ledger's own scale: whole
//! USD in the USD ledger, credits in the credits ledger, at a fixed
//! **1 USD = 1,000,000 credits**. There is no floating point anywhere
//! in balance or fee arithmetic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod cycle;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod payout;
pub mod transfer;

pub use account::{Account, AccountOwner};
pub use cycle::BillingCycle;
pub use error::{LedgerError, Result};
pub use ids::{
    AccountId, BillingCycleId, ContractId, IdError, PayoutId, StudioId, TransactionId, TransferId,
    UserId,
};
pub use ledger::{
    convert_between_ledgers, Converted, Currency, Ledger, SystemAccount, CREDITS_PER_USD,
};
pub use payout::{ExternalPayout, PayoutSettlement, PayoutStatus};
pub use transfer::{BillingCode, Transfer, TransferCode, TransferRecord};
