//! Error taxonomy for ledger operations.

use crate::ids::AccountId;
use crate::ledger::Currency;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by the transfer engine and its callers.
///
/// Every variant is a typed failure; no operation in the engine throws
/// for control flow, and a failed transaction never partially applies.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// One of a transfer's accounts does not exist.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The missing account.
        account_id: AccountId,
    },

    /// A transfer's currency does not match an account's currency.
    #[error(
        "currency mismatch on account {account_id}: account holds {account_currency:?}, transfer denominated in {transfer_currency:?}"
    )]
    CurrencyMismatch {
        /// The mismatched account.
        account_id: AccountId,
        /// The account's configured currency.
        account_currency: Currency,
        /// The currency the transfer was denominated in.
        transfer_currency: Currency,
    },

    /// A non-balancing debit would exceed the account's usable balance.
    #[error("insufficient balance on account {account_id}: available={available}, required={required}")]
    InsufficientBalance {
        /// The account that would go negative.
        account_id: AccountId,
        /// Usable balance at validation time.
        available: i64,
        /// The debit amount requested.
        required: i64,
    },

    /// A transfer leg is malformed (non-positive amount, self-transfer,
    /// empty transaction).
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// A store or engine failure, wrapping the lower-level cause.
    #[error("server error: {0}")]
    Server(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let account_id = AccountId::generate();
        let err = LedgerError::InsufficientBalance {
            account_id,
            available: 3,
            required: 10,
        };
        let message = err.to_string();
        assert!(message.contains("available=3"));
        assert!(message.contains("required=10"));
        assert!(message.contains(&account_id.to_string()));
    }
}
