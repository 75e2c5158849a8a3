//! The ledger controller.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tally_core::{
    Account, AccountId, AccountOwner, ExternalPayout, Ledger, LedgerError, PayoutId,
    PayoutSettlement, StudioId, SystemAccount, TransactionId, Transfer, TransferId,
    TransferRecord, UserId,
};
use tally_store::{Store, StoreError};

/// Metadata for initiating an external payout.
///
/// The funding transfer must already be committed; the request records
/// which transfer and transaction reserved the funds.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    /// Invoice this payout settles, if any.
    pub invoice_id: Option<String>,

    /// The user being paid out.
    pub user_id: Option<UserId>,

    /// The studio being paid out.
    pub studio_id: Option<StudioId>,

    /// The committed funding transfer.
    pub transfer_id: TransferId,

    /// The transaction the funding transfer was committed under.
    pub transaction_id: TransactionId,

    /// Processor-side transfer id, if already known.
    pub stripe_transfer_id: Option<String>,

    /// Processor destination reference.
    pub external_destination: String,

    /// Amount paid out, in USD.
    pub amount: i64,

    /// Initiation time, epoch milliseconds.
    pub now_ms: i64,
}

/// Executes transfers atomically and manages account lifecycle.
///
/// Balance updates are read-modify-write, so the controller serializes
/// all writes behind one mutex; concurrent transactions touching the
/// same account cannot lose updates. Atomicity of the persisted result
/// comes from the store's single-batch commit.
pub struct LedgerController {
    store: Arc<dyn Store>,
    write_lock: Mutex<()>,
}

impl LedgerController {
    /// Create a controller over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Execute one or more transfer legs as a single atomic transaction.
    ///
    /// Every leg is validated before anything is applied: positive
    /// amount, distinct accounts, both accounts present, and the leg's
    /// currency matching both accounts. Legs are then applied in order
    /// against an in-memory snapshot, so two legs touching the same
    /// account compose without an observable intermediate state, and
    /// the whole set is committed in one store write.
    ///
    /// Unless a leg is flagged `balancing_debit`, a debit from an owned
    /// (non-system) account must not exceed its usable balance at that
    /// point in the transaction. Balancing debits always apply, even
    /// into a negative balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidTransfer`] for an empty transaction or a
    /// malformed leg, [`LedgerError::AccountNotFound`],
    /// [`LedgerError::CurrencyMismatch`],
    /// [`LedgerError::InsufficientBalance`], or [`LedgerError::Server`]
    /// for store failures. On any error, no leg was applied.
    pub fn internal_transaction(
        &self,
        transfers: &[Transfer],
    ) -> Result<TransactionId, LedgerError> {
        if transfers.is_empty() {
            return Err(LedgerError::InvalidTransfer(
                "transaction has no transfers".to_string(),
            ));
        }

        let _guard = self.lock()?;

        let mut accounts: BTreeMap<AccountId, Account> = BTreeMap::new();
        for transfer in transfers {
            transfer.validate()?;

            for account_id in [transfer.debit_account, transfer.credit_account] {
                if !accounts.contains_key(&account_id) {
                    let account = self
                        .store
                        .get_account(&account_id)
                        .map_err(store_error)?
                        .ok_or(LedgerError::AccountNotFound { account_id })?;
                    accounts.insert(account_id, account);
                }

                let account = &accounts[&account_id];
                if account.currency != transfer.currency {
                    return Err(LedgerError::CurrencyMismatch {
                        account_id,
                        account_currency: account.currency,
                        transfer_currency: transfer.currency,
                    });
                }
            }
        }

        // Single application pass over the snapshot. Balance checks run
        // against the running state so earlier legs fund later ones.
        for transfer in transfers {
            if !transfer.balancing_debit {
                let debit = &accounts[&transfer.debit_account];
                if !debit.owner.is_system() && debit.available() < transfer.amount {
                    return Err(LedgerError::InsufficientBalance {
                        account_id: debit.id,
                        available: debit.available(),
                        required: transfer.amount,
                    });
                }
            }

            accounts
                .get_mut(&transfer.debit_account)
                .expect("account loaded above")
                .apply_posted_debit(transfer.amount);
            accounts
                .get_mut(&transfer.credit_account)
                .expect("account loaded above")
                .apply_posted_credit(transfer.amount);
        }

        let transaction_id = TransactionId::generate();
        let records: Vec<TransferRecord> = transfers
            .iter()
            .cloned()
            .map(|transfer| TransferRecord::new(transaction_id, transfer))
            .collect();
        let updated: Vec<Account> = accounts.into_values().collect();

        self.store
            .commit_transaction(&updated, &records)
            .map_err(store_error)?;

        tracing::info!(
            transaction_id = %transaction_id,
            legs = transfers.len(),
            "transaction committed"
        );

        Ok(transaction_id)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if it does not exist, or
    /// [`LedgerError::Server`] for store failures.
    pub fn get_account(&self, account_id: &AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(account_id)
            .map_err(store_error)?
            .ok_or(LedgerError::AccountNotFound {
                account_id: *account_id,
            })
    }

    /// Get the account for an `(owner, ledger)` pair, creating it on
    /// first access.
    ///
    /// Callers always get a usable account back; periodic billing
    /// relies on this to charge subscribers who have never held a
    /// balance. System accounts are not addressable here; they share
    /// the owner `None` and are looked up by fixed id via
    /// [`Self::system_account`].
    ///
    /// # Errors
    ///
    /// [`LedgerError::Server`] for store failures or an owner of
    /// [`AccountOwner::None`].
    pub fn get_financial_account(
        &self,
        owner: &AccountOwner,
        ledger: Ledger,
    ) -> Result<Account, LedgerError> {
        if owner.is_system() {
            return Err(LedgerError::Server(
                "system accounts are addressed by fixed id, not (owner, ledger)".to_string(),
            ));
        }

        if let Some(account) = self.store.find_account(owner, ledger).map_err(store_error)? {
            return Ok(account);
        }

        // Create under the write lock so two racing lookups cannot
        // create two accounts for the same pair.
        let _guard = self.lock()?;
        if let Some(account) = self.store.find_account(owner, ledger).map_err(store_error)? {
            return Ok(account);
        }

        let account = Account::new(AccountId::generate(), *owner, ledger);
        self.store.put_account(&account).map_err(store_error)?;

        tracing::debug!(
            account_id = %account.id,
            ledger = ?ledger,
            "created financial account on first access"
        );

        Ok(account)
    }

    /// Get a well-known system account, creating it on first access.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Server`] for store failures.
    pub fn system_account(&self, system: SystemAccount) -> Result<Account, LedgerError> {
        let account_id = system.account_id();
        if let Some(account) = self.store.get_account(&account_id).map_err(store_error)? {
            return Ok(account);
        }

        let _guard = self.lock()?;
        if let Some(account) = self.store.get_account(&account_id).map_err(store_error)? {
            return Ok(account);
        }

        let account = Account::system(system);
        self.store.put_account(&account).map_err(store_error)?;
        Ok(account)
    }

    // =========================================================================
    // Payouts
    // =========================================================================

    /// Record an initiated external payout.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Server`] for store failures.
    pub fn initiate_payout(&self, request: PayoutRequest) -> Result<ExternalPayout, LedgerError> {
        let payout = ExternalPayout {
            id: PayoutId::generate(),
            invoice_id: request.invoice_id,
            user_id: request.user_id,
            studio_id: request.studio_id,
            transfer_id: request.transfer_id,
            transaction_id: request.transaction_id,
            stripe_transfer_id: request.stripe_transfer_id,
            external_destination: request.external_destination,
            amount: request.amount,
            posted_transfer_id: None,
            voided_transfer_id: None,
            initiated_at_ms: request.now_ms,
            posted_at_ms: None,
            voided_at_ms: None,
        };

        self.store.put_payout(&payout).map_err(store_error)?;

        tracing::info!(
            payout_id = %payout.id,
            amount = payout.amount,
            "payout initiated"
        );

        Ok(payout)
    }

    /// Mark an initiated payout as posted.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Server`] if the payout is missing, already
    /// settled, or the store fails.
    pub fn mark_payout_as_posted(
        &self,
        payout_id: &PayoutId,
        transfer_id: TransferId,
        now_ms: i64,
    ) -> Result<ExternalPayout, LedgerError> {
        self.store
            .settle_payout(
                payout_id,
                PayoutSettlement::Posted {
                    transfer_id,
                    at_ms: now_ms,
                },
            )
            .map_err(store_error)
    }

    /// Mark an initiated payout as voided.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Server`] if the payout is missing, already
    /// settled, or the store fails.
    pub fn mark_payout_as_voided(
        &self,
        payout_id: &PayoutId,
        transfer_id: TransferId,
        now_ms: i64,
    ) -> Result<ExternalPayout, LedgerError> {
        self.store
            .settle_payout(
                payout_id,
                PayoutSettlement::Voided {
                    transfer_id,
                    at_ms: now_ms,
                },
            )
            .map_err(store_error)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, LedgerError> {
        self.write_lock
            .lock()
            .map_err(|_| LedgerError::Server("ledger write lock poisoned".to_string()))
    }
}

fn store_error(err: StoreError) -> LedgerError {
    LedgerError::Server(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{BillingCode, Currency, TransferCode};
    use tally_store::RocksStore;
    use tempfile::TempDir;

    fn controller() -> (LedgerController, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (LedgerController::new(store), dir)
    }

    fn funded_user_account(controller: &LedgerController, credits: i64) -> Account {
        let owner = AccountOwner::User(UserId::generate());
        let mut account = controller
            .get_financial_account(&owner, Ledger::Credits)
            .unwrap();
        account.credits_posted = credits;
        controller.store().put_account(&account).unwrap();
        account
    }

    fn leg(debit: &Account, credit: &Account, amount: i64) -> Transfer {
        Transfer {
            amount,
            debit_account: debit.id,
            credit_account: credit.id,
            code: TransferCode::AdminCredit,
            currency: Currency::Credits,
            billing_code: None,
            balancing_debit: false,
        }
    }

    #[test]
    fn transaction_moves_value_and_balances_per_currency() {
        let (controller, _dir) = controller();
        let payer = funded_user_account(&controller, 1_000);
        let payee = funded_user_account(&controller, 0);

        controller
            .internal_transaction(&[leg(&payer, &payee, 400)])
            .unwrap();

        let payer = controller.get_account(&payer.id).unwrap();
        let payee = controller.get_account(&payee.id).unwrap();
        assert_eq!(payer.balance(), 600);
        assert_eq!(payee.balance(), 400);

        // Double-entry: per-currency debits equal credits.
        assert_eq!(payer.debits_posted, payee.credits_posted);
    }

    #[test]
    fn empty_transaction_rejected() {
        let (controller, _dir) = controller();
        assert!(matches!(
            controller.internal_transaction(&[]),
            Err(LedgerError::InvalidTransfer(_))
        ));
    }

    #[test]
    fn missing_account_fails_whole_transaction() {
        let (controller, _dir) = controller();
        let payer = funded_user_account(&controller, 1_000);
        let ghost = Account::new(
            AccountId::generate(),
            AccountOwner::User(UserId::generate()),
            Ledger::Credits,
        );

        let result = controller.internal_transaction(&[leg(&payer, &ghost, 10)]);
        assert!(matches!(
            result,
            Err(LedgerError::AccountNotFound { account_id }) if account_id == ghost.id
        ));

        // Nothing applied.
        assert_eq!(controller.get_account(&payer.id).unwrap().balance(), 1_000);
    }

    #[test]
    fn currency_mismatch_rejected() {
        let (controller, _dir) = controller();
        let payer = funded_user_account(&controller, 1_000);
        let usd = controller.system_account(SystemAccount::LiquidityUsd).unwrap();

        let mut transfer = leg(&payer, &usd, 10);
        transfer.currency = Currency::Credits; // usd account holds Usd
        let result = controller.internal_transaction(&[transfer]);
        assert!(matches!(
            result,
            Err(LedgerError::CurrencyMismatch { account_id, .. }) if account_id == usd.id
        ));
    }

    #[test]
    fn insufficient_balance_blocks_plain_debit() {
        let (controller, _dir) = controller();
        let payer = funded_user_account(&controller, 50);
        let payee = funded_user_account(&controller, 0);

        let result = controller.internal_transaction(&[leg(&payer, &payee, 100)]);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                available: 50,
                required: 100,
                ..
            })
        ));
        assert_eq!(controller.get_account(&payer.id).unwrap().balance(), 50);
    }

    #[test]
    fn balancing_debit_goes_negative() {
        let (controller, _dir) = controller();
        let payer = funded_user_account(&controller, 10);
        let revenue = controller
            .system_account(SystemAccount::RevenueRecordsUsageCredits)
            .unwrap();

        let transfer = Transfer {
            amount: 75,
            debit_account: payer.id,
            credit_account: revenue.id,
            code: TransferCode::RecordsUsageFee,
            currency: Currency::Credits,
            billing_code: Some(BillingCode::InstCount),
            balancing_debit: true,
        };
        controller.internal_transaction(&[transfer]).unwrap();

        assert_eq!(controller.get_account(&payer.id).unwrap().balance(), -65);
        assert_eq!(controller.get_account(&revenue.id).unwrap().balance(), 75);
    }

    #[test]
    fn system_accounts_bypass_balance_checks() {
        let (controller, _dir) = controller();
        let liquidity = controller
            .system_account(SystemAccount::LiquidityCredits)
            .unwrap();
        let payee = funded_user_account(&controller, 0);

        // Non-balancing debit from an empty system account still applies.
        controller
            .internal_transaction(&[leg(&liquidity, &payee, 500)])
            .unwrap();
        assert_eq!(controller.get_account(&liquidity.id).unwrap().balance(), -500);
    }

    #[test]
    fn failing_leg_leaves_no_partial_state() {
        let (controller, _dir) = controller();
        let a = funded_user_account(&controller, 1_000);
        let b = funded_user_account(&controller, 0);
        let c = funded_user_account(&controller, 0);

        // Second leg overdraws c, which got nothing from the first leg.
        let result = controller.internal_transaction(&[leg(&a, &b, 100), leg(&c, &b, 100)]);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { .. })
        ));

        assert_eq!(controller.get_account(&a.id).unwrap().balance(), 1_000);
        assert_eq!(controller.get_account(&b.id).unwrap().balance(), 0);
        assert_eq!(controller.get_account(&c.id).unwrap().balance(), 0);
        assert!(controller
            .store()
            .list_transfers_by_account(&a.id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn same_transaction_legs_compose_in_order() {
        let (controller, _dir) = controller();
        let a = funded_user_account(&controller, 100);
        let b = funded_user_account(&controller, 0);
        let c = funded_user_account(&controller, 0);

        // b can only fund the second leg because the first leg credits it
        // within the same transaction.
        controller
            .internal_transaction(&[leg(&a, &b, 100), leg(&b, &c, 60)])
            .unwrap();

        assert_eq!(controller.get_account(&a.id).unwrap().balance(), 0);
        assert_eq!(controller.get_account(&b.id).unwrap().balance(), 40);
        assert_eq!(controller.get_account(&c.id).unwrap().balance(), 60);
    }

    #[test]
    fn cross_ledger_swap_commits_both_legs() {
        let (controller, _dir) = controller();
        let revenue_credits = controller
            .system_account(SystemAccount::RevenueRecordsUsageCredits)
            .unwrap();
        let liquidity_credits = controller
            .system_account(SystemAccount::LiquidityCredits)
            .unwrap();
        let liquidity_usd = controller.system_account(SystemAccount::LiquidityUsd).unwrap();
        let revenue_usd = controller
            .system_account(SystemAccount::RevenueRecordsUsageUsd)
            .unwrap();

        let credits_leg = Transfer {
            amount: 2_000_000,
            debit_account: revenue_credits.id,
            credit_account: liquidity_credits.id,
            code: TransferCode::RevenueCreditSweep,
            currency: Currency::Credits,
            billing_code: None,
            balancing_debit: false,
        };
        let usd_leg = Transfer {
            amount: 2,
            debit_account: liquidity_usd.id,
            credit_account: revenue_usd.id,
            code: TransferCode::RevenueCreditSweep,
            currency: Currency::Usd,
            billing_code: None,
            balancing_debit: false,
        };

        let transaction_id = controller
            .internal_transaction(&[credits_leg, usd_leg])
            .unwrap();

        // Both legs share the transaction.
        let listed = controller
            .store()
            .list_transfers_by_account(&liquidity_usd.id)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].transaction_id, transaction_id);
        assert_eq!(
            controller.get_account(&revenue_usd.id).unwrap().balance(),
            2
        );
    }

    #[test]
    fn posted_debits_equal_posted_credits_per_currency() {
        let (controller, _dir) = controller();
        let liquidity_credits = controller
            .system_account(SystemAccount::LiquidityCredits)
            .unwrap();
        let liquidity_usd = controller.system_account(SystemAccount::LiquidityUsd).unwrap();
        let revenue_usd = controller
            .system_account(SystemAccount::RevenueRecordsUsageUsd)
            .unwrap();
        let a = funded_user_account(&controller, 0);
        let b = funded_user_account(&controller, 0);

        let usd_leg = Transfer {
            amount: 7,
            debit_account: liquidity_usd.id,
            credit_account: revenue_usd.id,
            code: TransferCode::RevenueCreditSweep,
            currency: Currency::Usd,
            billing_code: None,
            balancing_debit: false,
        };
        // Every credit enters through the ledger, so per-currency sums
        // over all touched accounts must balance exactly.
        controller
            .internal_transaction(&[
                leg(&liquidity_credits, &a, 1_000),
                leg(&a, &b, 300),
                leg(&b, &a, 120),
                usd_leg,
            ])
            .unwrap();

        let mut sums: BTreeMap<Currency, (i64, i64)> = BTreeMap::new();
        for id in [a.id, b.id, liquidity_credits.id, liquidity_usd.id, revenue_usd.id] {
            let account = controller.get_account(&id).unwrap();
            let entry = sums.entry(account.currency).or_default();
            entry.0 += account.debits_posted;
            entry.1 += account.credits_posted;
        }
        for (debits, credits) in sums.values() {
            assert_eq!(debits, credits);
        }
    }

    #[test]
    fn get_financial_account_creates_once() {
        let (controller, _dir) = controller();
        let owner = AccountOwner::Studio(StudioId::generate());

        let first = controller
            .get_financial_account(&owner, Ledger::Credits)
            .unwrap();
        let second = controller
            .get_financial_account(&owner, Ledger::Credits)
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.currency, Currency::Credits);

        // A different ledger gets its own account.
        let usd = controller.get_financial_account(&owner, Ledger::Usd).unwrap();
        assert_ne!(usd.id, first.id);
    }

    #[test]
    fn get_financial_account_rejects_system_owner() {
        let (controller, _dir) = controller();
        assert!(matches!(
            controller.get_financial_account(&AccountOwner::None, Ledger::Credits),
            Err(LedgerError::Server(_))
        ));
    }

    #[test]
    fn system_account_is_stable_across_lookups() {
        let (controller, _dir) = controller();
        let first = controller.system_account(SystemAccount::LiquidityUsd).unwrap();
        let second = controller.system_account(SystemAccount::LiquidityUsd).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, SystemAccount::LiquidityUsd.account_id());
    }

    #[test]
    fn payout_lifecycle_posted_is_final() {
        let (controller, _dir) = controller();
        let payout = controller
            .initiate_payout(PayoutRequest {
                invoice_id: None,
                user_id: Some(UserId::generate()),
                studio_id: None,
                transfer_id: TransferId::generate(),
                transaction_id: TransactionId::generate(),
                stripe_transfer_id: None,
                external_destination: "acct_7".to_string(),
                amount: 40,
                now_ms: 1_000,
            })
            .unwrap();

        let posted = controller
            .mark_payout_as_posted(&payout.id, TransferId::generate(), 2_000)
            .unwrap();
        assert_eq!(posted.posted_at_ms, Some(2_000));

        let result =
            controller.mark_payout_as_voided(&payout.id, TransferId::generate(), 3_000);
        assert!(matches!(result, Err(LedgerError::Server(_))));
    }
}
