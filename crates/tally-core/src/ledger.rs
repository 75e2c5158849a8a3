//! Currency domains and conversion.
//!
//! A [`Ledger`] is an isolated currency domain with an integer-only
//! amount representation. Ledgers are process-wide constants, never
//! created at runtime, and each pair of ledgers has a fixed exchange
//! rate derived from its scale relative to one USD.
//!
//! # Exchange rate
//!
//! **1 USD = 1,000,000 credits.** Conversion is exact integer
//! arithmetic: the converted value truncates toward zero, and whatever
//! could not be represented in the target scale comes back as a
//! remainder in the source scale.

use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// Credits per one USD: the fixed exchange rate between the two ledgers.
pub const CREDITS_PER_USD: i64 = 1_000_000;

/// The currency a transfer or account is denominated in.
///
/// One-to-one with [`Ledger`]; kept as a separate type because transfers
/// carry a currency of their own and the engine checks it against both
/// touched accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// US dollars.
    Usd,

    /// Internal credits.
    Credits,
}

/// A currency domain.
///
/// Every account lives in exactly one ledger, and every transfer is
/// denominated in its ledger's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ledger {
    /// Real money, in whole US dollars.
    Usd = 0,

    /// Internal credits, at 1,000,000 credits per USD.
    Credits = 1,
}

impl Ledger {
    /// The currency this ledger's amounts are denominated in.
    #[must_use]
    pub const fn currency(self) -> Currency {
        match self {
            Self::Usd => Currency::Usd,
            Self::Credits => Currency::Credits,
        }
    }

    /// How many of this ledger's units make up one USD.
    #[must_use]
    pub const fn units_per_usd(self) -> i64 {
        match self {
            Self::Usd => 1,
            Self::Credits => CREDITS_PER_USD,
        }
    }

    /// A stable single-byte encoding for store keys.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// The result of converting an amount between ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Converted {
    /// The converted amount, in the target ledger's scale, truncated
    /// toward zero.
    pub value: i64,

    /// The leftover in the *source* ledger's scale that could not be
    /// represented in the target scale. Zero when the conversion was
    /// exact.
    pub remainder: i64,
}

/// Convert an amount from one ledger's scale to another's.
///
/// Pure and deterministic; integer arithmetic only (`i128`
/// intermediates, so any `i64` amount converts without overflow).
///
/// Truncation is lossy by design: `to -> from -> to` is idempotent on
/// the truncated value, but a round trip does not recover the original
/// amount when a remainder existed. Callers that need the two sides of
/// a swap to match exactly must convert the truncated value back and
/// use *that* as the source-side amount.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn convert_between_ledgers(from: Ledger, to: Ledger, amount: i64) -> Converted {
    if from == to {
        return Converted {
            value: amount,
            remainder: 0,
        };
    }

    let num = i128::from(to.units_per_usd());
    let den = i128::from(from.units_per_usd());

    // Truncated exact rational conversion, then the unconverted leftover
    // expressed back in the source scale.
    let value = i128::from(amount) * num / den;
    let consumed = value * den / num;
    let remainder = i128::from(amount) - consumed;

    Converted {
        value: value as i64,
        remainder: remainder as i64,
    }
}

/// The well-known system accounts.
///
/// System accounts are owned by no user, studio, or contract, and are
/// addressed by these fixed ids rather than an `(owner, ledger)` pair.
/// Matching on this enum is exhaustive, so adding an account forces
/// every call site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAccount {
    /// The platform's USD float backing credit liabilities.
    LiquidityUsd,

    /// The platform's credit float, counterpart of swept revenue.
    LiquidityCredits,

    /// Recognized records-usage revenue, in USD.
    RevenueRecordsUsageUsd,

    /// Accumulated records-usage fees awaiting the revenue sweep, in
    /// credits.
    RevenueRecordsUsageCredits,
}

impl SystemAccount {
    /// All system accounts, for bootstrap and iteration.
    pub const ALL: [Self; 4] = [
        Self::LiquidityUsd,
        Self::LiquidityCredits,
        Self::RevenueRecordsUsageUsd,
        Self::RevenueRecordsUsageCredits,
    ];

    /// The fixed id of this system account.
    #[must_use]
    pub const fn account_id(self) -> AccountId {
        let raw = match self {
            Self::LiquidityUsd => 0x0000_0000_0000_0000_0000_0000_0000_0001,
            Self::LiquidityCredits => 0x0000_0000_0000_0000_0000_0000_0000_0002,
            Self::RevenueRecordsUsageUsd => 0x0000_0000_0000_0000_0000_0000_0000_0003,
            Self::RevenueRecordsUsageCredits => 0x0000_0000_0000_0000_0000_0000_0000_0004,
        };
        AccountId::from_uuid(uuid::Uuid::from_u128(raw))
    }

    /// The ledger this system account lives in.
    #[must_use]
    pub const fn ledger(self) -> Ledger {
        match self {
            Self::LiquidityUsd | Self::RevenueRecordsUsageUsd => Ledger::Usd,
            Self::LiquidityCredits | Self::RevenueRecordsUsageCredits => Ledger::Credits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_to_usd_truncates_with_remainder() {
        let converted = convert_between_ledgers(Ledger::Credits, Ledger::Usd, 1_150_000);
        assert_eq!(
            converted,
            Converted {
                value: 1,
                remainder: 150_000
            }
        );
    }

    #[test]
    fn credits_to_usd_exact() {
        let converted = convert_between_ledgers(Ledger::Credits, Ledger::Usd, 3_000_000);
        assert_eq!(
            converted,
            Converted {
                value: 3,
                remainder: 0
            }
        );
    }

    #[test]
    fn usd_to_credits_is_always_exact() {
        let converted = convert_between_ledgers(Ledger::Usd, Ledger::Credits, 7);
        assert_eq!(
            converted,
            Converted {
                value: 7_000_000,
                remainder: 0
            }
        );
    }

    #[test]
    fn same_ledger_is_identity() {
        let converted = convert_between_ledgers(Ledger::Credits, Ledger::Credits, 42);
        assert_eq!(
            converted,
            Converted {
                value: 42,
                remainder: 0
            }
        );
    }

    #[test]
    fn sub_usd_amount_collapses_to_zero() {
        let converted = convert_between_ledgers(Ledger::Credits, Ledger::Usd, 999_999);
        assert_eq!(
            converted,
            Converted {
                value: 0,
                remainder: 999_999
            }
        );
    }

    #[test]
    fn round_trip_of_truncated_value_is_idempotent() {
        let first = convert_between_ledgers(Ledger::Credits, Ledger::Usd, 1_150_000);
        let back = convert_between_ledgers(Ledger::Usd, Ledger::Credits, first.value);
        let again = convert_between_ledgers(Ledger::Credits, Ledger::Usd, back.value);
        assert_eq!(again.value, first.value);
        assert_eq!(again.remainder, 0);
    }

    #[test]
    fn negative_amounts_truncate_toward_zero() {
        let converted = convert_between_ledgers(Ledger::Credits, Ledger::Usd, -1_150_000);
        assert_eq!(
            converted,
            Converted {
                value: -1,
                remainder: -150_000
            }
        );
    }

    #[test]
    fn system_account_ids_are_distinct() {
        for a in SystemAccount::ALL {
            for b in SystemAccount::ALL {
                if a != b {
                    assert_ne!(a.account_id(), b.account_id());
                }
            }
        }
    }

    #[test]
    fn system_account_ledgers() {
        assert_eq!(SystemAccount::LiquidityUsd.ledger(), Ledger::Usd);
        assert_eq!(
            SystemAccount::RevenueRecordsUsageCredits.ledger(),
            Ledger::Credits
        );
    }
}
