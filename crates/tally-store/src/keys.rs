//! Key encoding for the column families.
//!
//! All keys are fixed-width byte strings so lexicographic order is
//! meaningful: ULID-keyed records sort chronologically, and the
//! billing-cycle keys lead with a big-endian timestamp so the latest
//! cycle is the last key.

use tally_core::{
    AccountId, AccountOwner, BillingCycle, Ledger, PayoutId, TransferId,
};

/// Create an account key from an account id.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create an owner-index key for an `(owner, ledger)` pair.
///
/// Format: `tag (1 byte) || owner id (16 bytes) || ledger (1 byte)`.
///
/// Only owned accounts are indexed; system accounts (owner `None`)
/// share the pair `(None, ledger)` and are addressed by their fixed
/// ids instead, so indexing them would clobber one another.
#[must_use]
pub fn owner_key(owner: &AccountOwner, ledger: Ledger) -> Option<Vec<u8>> {
    let (tag, id_bytes): (u8, [u8; 16]) = match owner {
        AccountOwner::User(id) => (1, *id.as_bytes()),
        AccountOwner::Studio(id) => (2, *id.as_bytes()),
        AccountOwner::Contract(id) => (3, *id.as_bytes()),
        AccountOwner::None => return None,
    };

    let mut key = Vec::with_capacity(18);
    key.push(tag);
    key.extend_from_slice(&id_bytes);
    key.push(ledger.as_byte());
    Some(key)
}

/// Create a transfer key from a transfer id.
#[must_use]
pub fn transfer_key(transfer_id: &TransferId) -> Vec<u8> {
    transfer_id.to_bytes().to_vec()
}

/// Create an account-transfer index key.
///
/// Format: `account id (16 bytes) || transfer id (16 bytes)`. ULIDs are
/// time-ordered, so a prefix scan reads a given account's transfers
/// chronologically.
#[must_use]
pub fn account_transfer_key(account_id: &AccountId, transfer_id: &TransferId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&transfer_id.to_bytes());
    key
}

/// Create a prefix for iterating all transfers of an account.
#[must_use]
pub fn account_transfers_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the transfer id from an account-transfer index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_transfer_id_from_account_key(key: &[u8]) -> TransferId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    TransferId::from_bytes(bytes)
}

/// Create a billing-cycle key.
///
/// Format: `time_ms (8 bytes, big-endian) || cycle id (16 bytes)`.
/// The leading timestamp makes the most recent cycle the last key in
/// the column family; the id breaks ties between cycles recorded in
/// the same millisecond.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn billing_cycle_key(cycle: &BillingCycle) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&(cycle.time_ms as u64).to_be_bytes());
    key.extend_from_slice(cycle.id.as_bytes());
    key
}

/// Create a payout key from a payout id.
#[must_use]
pub fn payout_key(payout_id: &PayoutId) -> Vec<u8> {
    payout_id.as_bytes().to_vec()
}
