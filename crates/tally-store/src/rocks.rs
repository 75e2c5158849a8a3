//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use tally_core::{
    Account, AccountId, AccountOwner, BillingCycle, ExternalPayout, Ledger, PayoutId,
    PayoutSettlement, TransferId, TransferRecord,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// `RocksDB`-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Stage an account row (and its owner index entry) into a batch.
    fn stage_account(
        &self,
        batch: &mut WriteBatch,
        account: &Account,
    ) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let value = Self::serialize(account)?;
        batch.put_cf(&cf_accounts, keys::account_key(&account.id), value);

        if let Some(owner_key) = keys::owner_key(&account.owner, account.ledger) {
            let cf_by_owner = self.cf(cf::ACCOUNTS_BY_OWNER)?;
            batch.put_cf(&cf_by_owner, owner_key, account.id.as_bytes());
        }

        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Accounts
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_account(&mut batch, account)?;

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;

        self.db
            .get_cf(&cf, keys::account_key(account_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn find_account(&self, owner: &AccountOwner, ledger: Ledger) -> Result<Option<Account>> {
        let Some(owner_key) = keys::owner_key(owner, ledger) else {
            return Ok(None);
        };

        let cf_by_owner = self.cf(cf::ACCOUNTS_BY_OWNER)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf_by_owner, owner_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        if id_bytes.len() != 16 {
            return Err(StoreError::Database(
                "malformed owner index entry".to_string(),
            ));
        }
        bytes.copy_from_slice(&id_bytes);
        let account_id = AccountId::from_uuid(uuid_from_bytes(bytes));

        self.get_account(&account_id)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn commit_transaction(
        &self,
        accounts: &[Account],
        transfers: &[TransferRecord],
    ) -> Result<()> {
        let cf_transfers = self.cf(cf::TRANSFERS)?;
        let cf_by_account = self.cf(cf::TRANSFERS_BY_ACCOUNT)?;

        let mut batch = WriteBatch::default();

        for account in accounts {
            self.stage_account(&mut batch, account)?;
        }

        for record in transfers {
            let value = Self::serialize(record)?;
            batch.put_cf(&cf_transfers, keys::transfer_key(&record.id), value);

            // Index both sides; each index entry is key-only.
            let debit_key =
                keys::account_transfer_key(&record.transfer.debit_account, &record.id);
            let credit_key =
                keys::account_transfer_key(&record.transfer.credit_account, &record.id);
            batch.put_cf(&cf_by_account, debit_key, b"");
            batch.put_cf(&cf_by_account, credit_key, b"");
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_transfer(&self, transfer_id: &TransferId) -> Result<Option<TransferRecord>> {
        let cf = self.cf(cf::TRANSFERS)?;

        self.db
            .get_cf(&cf, keys::transfer_key(transfer_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transfers_by_account(&self, account_id: &AccountId) -> Result<Vec<TransferRecord>> {
        let cf_by_account = self.cf(cf::TRANSFERS_BY_ACCOUNT)?;
        let prefix = keys::account_transfers_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf_by_account,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut transfers = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            let transfer_id = keys::extract_transfer_id_from_account_key(&key);
            if let Some(record) = self.get_transfer(&transfer_id)? {
                transfers.push(record);
            }
        }

        Ok(transfers)
    }

    // =========================================================================
    // Billing cycles
    // =========================================================================

    fn put_billing_cycle(&self, cycle: &BillingCycle) -> Result<()> {
        let cf = self.cf(cf::BILLING_CYCLES)?;
        let value = Self::serialize(cycle)?;

        self.db
            .put_cf(&cf, keys::billing_cycle_key(cycle), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn latest_billing_cycle(&self) -> Result<Option<BillingCycle>> {
        let cf = self.cf(cf::BILLING_CYCLES)?;

        // Keys lead with big-endian time, so the last key is the most
        // recent cycle.
        let mut iter = self.db.iterator_cf(&cf, IteratorMode::End);

        iter.next()
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|(_, data)| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Payouts
    // =========================================================================

    fn put_payout(&self, payout: &ExternalPayout) -> Result<()> {
        let cf = self.cf(cf::PAYOUTS)?;
        let value = Self::serialize(payout)?;

        self.db
            .put_cf(&cf, keys::payout_key(&payout.id), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_payout(&self, payout_id: &PayoutId) -> Result<Option<ExternalPayout>> {
        let cf = self.cf(cf::PAYOUTS)?;

        self.db
            .get_cf(&cf, keys::payout_key(payout_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn settle_payout(
        &self,
        payout_id: &PayoutId,
        settlement: PayoutSettlement,
    ) -> Result<ExternalPayout> {
        let mut payout = self.get_payout(payout_id)?.ok_or(StoreError::NotFound)?;

        if payout.is_settled() {
            return Err(StoreError::PayoutSettled {
                payout_id: *payout_id,
            });
        }

        match settlement {
            PayoutSettlement::Posted { transfer_id, at_ms } => {
                payout.posted_transfer_id = Some(transfer_id);
                payout.posted_at_ms = Some(at_ms);
            }
            PayoutSettlement::Voided { transfer_id, at_ms } => {
                payout.voided_transfer_id = Some(transfer_id);
                payout.voided_at_ms = Some(at_ms);
            }
        }

        self.put_payout(&payout)?;
        Ok(payout)
    }
}

/// Rebuild a UUID from raw index bytes.
fn uuid_from_bytes(bytes: [u8; 16]) -> uuid::Uuid {
    uuid::Uuid::from_bytes(bytes)
}
