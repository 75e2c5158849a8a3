//! Column family definitions.

/// Column family names.
pub mod cf {
    /// Account records, keyed by account id.
    pub const ACCOUNTS: &str = "accounts";

    /// Owner index: `(owner, ledger)` key to account id.
    pub const ACCOUNTS_BY_OWNER: &str = "accounts_by_owner";

    /// Transfer records, keyed by transfer id (ULID).
    pub const TRANSFERS: &str = "transfers";

    /// Per-account transfer index for chronological listing.
    pub const TRANSFERS_BY_ACCOUNT: &str = "transfers_by_account";

    /// Billing cycle history, keyed by big-endian run time.
    pub const BILLING_CYCLES: &str = "billing_cycles";

    /// External payouts, keyed by payout id.
    pub const PAYOUTS: &str = "payouts";
}

/// All column families, for database open.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_OWNER,
        cf::TRANSFERS,
        cf::TRANSFERS_BY_ACCOUNT,
        cf::BILLING_CYCLES,
        cf::PAYOUTS,
    ]
}
