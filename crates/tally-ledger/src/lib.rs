//! The tally transfer engine.
//!
//! [`LedgerController`] executes groups of transfer legs as single
//! atomic transactions over the store, enforcing the double-entry
//! invariant: every leg debits one account and credits another by the
//! same amount, so per-currency credit and debit sums always balance.
//!
//! The controller also owns lazy account creation (`(owner, ledger)`
//! pairs and the well-known system accounts) and the external payout
//! lifecycle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod controller;

pub use controller::{LedgerController, PayoutRequest};
