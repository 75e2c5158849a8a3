//! The billing job processor.

use std::sync::Arc;

use tally_core::{
    convert_between_ledgers, AccountOwner, BillingCode, BillingCycle, Currency, Ledger,
    SystemAccount, Transfer, TransferCode,
};
use tally_ledger::LedgerController;

use crate::config::{FeaturesConfiguration, ResourceFees, SubscriptionConfigSource};
use crate::error::{JobError, Result};
use crate::job::BillingJob;
use crate::metrics::{MetricsSource, SubscriberUsage};

/// Default proration anchor when no billing cycle has ever run.
const MS_PER_DAY: i64 = 86_400_000;

/// Bytes per billed kilobyte.
const BYTES_PER_KB: u64 = 1024;

/// One resource dimension pair to bill for a subscriber.
struct ResourceUsage {
    count: u64,
    bytes: u64,
    count_code: BillingCode,
    byte_code: BillingCode,
}

/// Orchestrates the recurring billing jobs.
///
/// Stateless between invocations: everything it knows lives in the
/// store (accounts, transfers, billing-cycle history), so any number of
/// processor instances can serve the scheduler as long as they share
/// the ledger controller's write serialization.
pub struct BillingProcessor {
    ledger: Arc<LedgerController>,
    metrics: Arc<dyn MetricsSource>,
    config: Arc<dyn SubscriptionConfigSource>,
}

impl BillingProcessor {
    /// Create a processor over its collaborators.
    #[must_use]
    pub fn new(
        ledger: Arc<LedgerController>,
        metrics: Arc<dyn MetricsSource>,
        config: Arc<dyn SubscriptionConfigSource>,
    ) -> Self {
        Self {
            ledger,
            metrics,
            config,
        }
    }

    /// Run one job to completion.
    ///
    /// # Errors
    ///
    /// [`JobError::Server`] when the job as a whole failed and should
    /// be retried on the next scheduled run. Per-subscriber failures
    /// inside periodic billing are logged and skipped, never surfaced.
    pub async fn run(&self, job: BillingJob) -> Result<()> {
        match job {
            BillingJob::RevenueCreditSweep => self.run_revenue_credit_sweep(),
            BillingJob::PeriodicBilling { now_ms } => {
                let now_ms = now_ms.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
                self.run_periodic_billing(now_ms).await
            }
        }
    }

    // =========================================================================
    // Revenue-credit sweep
    // =========================================================================

    /// Convert the accumulated usage-fee credits into USD revenue.
    ///
    /// The sweep is a two-leg cross-ledger swap committed atomically:
    /// credits move from the usage-revenue pool into the credit float,
    /// and the matching USD moves from the dollar float into recognized
    /// revenue. When the conversion leaves a remainder, the credits
    /// actually swept are recomputed from the truncated USD value so
    /// the two legs agree exactly; the remainder stays behind for the
    /// next sweep.
    fn run_revenue_credit_sweep(&self) -> Result<()> {
        let revenue_credits = self
            .ledger
            .system_account(SystemAccount::RevenueRecordsUsageCredits)?;

        let balance = revenue_credits.balance();
        if balance <= 0 {
            tracing::debug!(balance, "no revenue credits to sweep");
            return Ok(());
        }

        let converted = convert_between_ledgers(Ledger::Credits, Ledger::Usd, balance);
        if converted.value == 0 {
            // Less than one whole USD accumulated; sweep next time.
            tracing::debug!(balance, "revenue credits below one USD, deferring sweep");
            return Ok(());
        }

        let credits_swept = if converted.remainder == 0 {
            balance
        } else {
            convert_between_ledgers(Ledger::Usd, Ledger::Credits, converted.value).value
        };

        let liquidity_credits = self.ledger.system_account(SystemAccount::LiquidityCredits)?;
        let liquidity_usd = self.ledger.system_account(SystemAccount::LiquidityUsd)?;
        let revenue_usd = self
            .ledger
            .system_account(SystemAccount::RevenueRecordsUsageUsd)?;

        let legs = [
            Transfer {
                amount: credits_swept,
                debit_account: revenue_credits.id,
                credit_account: liquidity_credits.id,
                code: TransferCode::RevenueCreditSweep,
                currency: Currency::Credits,
                billing_code: None,
                balancing_debit: false,
            },
            Transfer {
                amount: converted.value,
                debit_account: liquidity_usd.id,
                credit_account: revenue_usd.id,
                code: TransferCode::RevenueCreditSweep,
                currency: Currency::Usd,
                billing_code: None,
                balancing_debit: false,
            },
        ];

        let transaction_id = self.ledger.internal_transaction(&legs).map_err(|err| {
            tracing::error!(error = %err, "revenue credit sweep failed");
            JobError::Server(err.to_string())
        })?;

        tracing::info!(
            transaction_id = %transaction_id,
            credits_swept,
            usd_posted = converted.value,
            remainder = converted.remainder,
            "revenue credit sweep committed"
        );

        Ok(())
    }

    // =========================================================================
    // Periodic billing
    // =========================================================================

    /// Charge every subscriber prorated usage fees, then record the
    /// billing cycle.
    ///
    /// Proration anchors on wall-clock time since the latest billing
    /// cycle, not on a per-subscriber per-period marker: two rapid
    /// invocations each compute a nonzero (large) period fraction and
    /// each charge a correspondingly small fee. That is the documented
    /// behavior, deliberately preserved rather than deduplicated.
    async fn run_periodic_billing(&self, now_ms: i64) -> Result<()> {
        if !self.config.has_configuration().await {
            tracing::warn!("no subscription configuration available, skipping periodic billing");
            return Ok(());
        }

        let time_since_ms = match self.ledger.store().latest_billing_cycle()? {
            Some(cycle) => now_ms - cycle.time_ms,
            None => MS_PER_DAY,
        };

        tracing::debug!(now_ms, time_since_ms, "starting periodic billing");

        for metrics in self.metrics.all_subscription_inst_metrics().await? {
            if metrics.total_insts == 0 && metrics.total_inst_bytes == 0 {
                continue;
            }

            let usage = ResourceUsage {
                count: metrics.total_insts,
                bytes: metrics.total_inst_bytes,
                count_code: BillingCode::InstCount,
                byte_code: BillingCode::InstBytes,
            };
            self.bill_subscriber(
                &metrics.subscriber,
                usage,
                time_since_ms,
                |features| features.insts,
            )
            .await;
        }

        for metrics in self.metrics.all_file_subscription_metrics().await? {
            if metrics.total_files == 0 && metrics.total_file_bytes_reserved == 0 {
                continue;
            }

            let usage = ResourceUsage {
                count: metrics.total_files,
                bytes: metrics.total_file_bytes_reserved,
                count_code: BillingCode::FileCount,
                byte_code: BillingCode::FileBytes,
            };
            self.bill_subscriber(
                &metrics.subscriber,
                usage,
                time_since_ms,
                |features| features.files,
            )
            .await;
        }

        self.ledger
            .store()
            .put_billing_cycle(&BillingCycle::at(now_ms))?;

        tracing::info!(now_ms, "periodic billing cycle recorded");
        Ok(())
    }

    /// Bill one subscriber for one resource kind.
    ///
    /// Never fails the job: every failure path logs and returns, so one
    /// bad subscriber cannot block billing the rest.
    async fn bill_subscriber(
        &self,
        subscriber: &SubscriberUsage,
        usage: ResourceUsage,
        time_since_ms: i64,
        select_fees: fn(&FeaturesConfiguration) -> Option<ResourceFees>,
    ) {
        let owner = if let Some(user_id) = subscriber.user_id {
            AccountOwner::User(user_id)
        } else if let Some(studio_id) = subscriber.studio_id {
            AccountOwner::Studio(studio_id)
        } else {
            tracing::warn!(
                subscription_id = %subscriber.subscription_id,
                "subscriber has neither user nor studio owner, skipping"
            );
            return;
        };

        let Some(period_length_ms) = subscriber.period_length_ms() else {
            tracing::debug!(
                subscription_id = %subscriber.subscription_id,
                "current billing period unknown, skipping"
            );
            return;
        };

        let Some(features) = self
            .config
            .subscription_features(&subscriber.subscription_id, &subscriber.subscription_type)
            .await
        else {
            tracing::debug!(
                subscription_id = %subscriber.subscription_id,
                subscription_type = %subscriber.subscription_type,
                "no feature configuration for tier, skipping"
            );
            return;
        };

        let Some(fees) = select_fees(&features) else {
            tracing::debug!(
                subscription_id = %subscriber.subscription_id,
                "feature not allowed for subscription, skipping"
            );
            return;
        };

        let fraction = fraction_of_current_period(period_length_ms, time_since_ms);

        if let Err(err) = self.charge_fees(&owner, &usage, &fees, fraction).await {
            tracing::warn!(
                subscription_id = %subscriber.subscription_id,
                error = %err,
                "failed to bill subscriber, continuing"
            );
        }
    }

    /// Compute and submit the fee transfers for one resource kind.
    async fn charge_fees(
        &self,
        owner: &AccountOwner,
        usage: &ResourceUsage,
        fees: &ResourceFees,
        fraction: i64,
    ) -> Result<()> {
        let account = self.ledger.get_financial_account(owner, Ledger::Credits)?;
        let revenue = self
            .ledger
            .system_account(SystemAccount::RevenueRecordsUsageCredits)?;

        let mut legs = Vec::with_capacity(2);

        if let Some(fee_per_period) = fees.fee_per_count_per_period {
            let total = prorated_total(fee_per_period, fraction, usage.count);
            if total > 0 {
                legs.push(fee_leg(account.id, revenue.id, total, usage.count_code));
            }
        }

        if let Some(fee_per_period) = fees.fee_per_kb_per_period {
            let kilobytes = whole_kilobytes(usage.bytes);
            let total = prorated_total(fee_per_period, fraction, kilobytes);
            if total > 0 {
                legs.push(fee_leg(account.id, revenue.id, total, usage.byte_code));
            }
        }

        if legs.is_empty() {
            return Ok(());
        }

        let transaction_id = self.ledger.internal_transaction(&legs)?;
        tracing::info!(
            transaction_id = %transaction_id,
            account_id = %account.id,
            legs = legs.len(),
            "usage fees charged"
        );
        Ok(())
    }
}

/// Build one usage-fee leg.
///
/// Fee transfers always carry `balancing_debit`: the fee is collected
/// even when it drives the subscriber's balance negative.
fn fee_leg(
    debit_account: tally_core::AccountId,
    credit_account: tally_core::AccountId,
    amount: i64,
    billing_code: BillingCode,
) -> Transfer {
    Transfer {
        amount,
        debit_account,
        credit_account,
        code: TransferCode::RecordsUsageFee,
        currency: Currency::Credits,
        billing_code: Some(billing_code),
        balancing_debit: true,
    }
}

/// How many proration fractions of the billing period have yet to
/// elapse: `ceil(period_length / time_since_last_billing)`, never
/// below 1.
///
/// Used as a divisor on per-period fees so a fee configured "per
/// billing period" is charged proportionally to the wall-clock time
/// since the last run. Rounding up means the platform never
/// overcharges a single run past its elapsed share.
fn fraction_of_current_period(period_length_ms: i64, time_since_last_billing_ms: i64) -> i64 {
    let time_since = time_since_last_billing_ms.max(1);
    let period = period_length_ms.max(1);
    let fraction = (period + time_since - 1) / time_since;
    fraction.max(1)
}

/// Whole kilobytes of usage, rounded up.
fn whole_kilobytes(bytes: u64) -> u64 {
    bytes.div_ceil(BYTES_PER_KB)
}

/// Total fee for one dimension at the given period fraction.
///
/// The per-fraction fee uses integer division: a per-period fee
/// smaller than the fraction truncates to zero and that dimension is
/// silently not charged this run. Deliberately preserved behavior.
fn prorated_total(fee_per_period: i64, fraction: i64, usage: u64) -> i64 {
    let per_fraction_fee = fee_per_period / fraction;
    let usage = i64::try_from(usage).unwrap_or(i64::MAX);
    per_fraction_fee.saturating_mul(usage)
}
