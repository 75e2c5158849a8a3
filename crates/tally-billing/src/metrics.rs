//! Usage metrics: the read-only input to periodic billing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tally_core::{StudioId, UserId};

use crate::error::Result;

/// Identity and billing-period context shared by all metric kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberUsage {
    /// The owning user, for user subscriptions.
    pub user_id: Option<UserId>,

    /// The owning studio, for studio subscriptions.
    pub studio_id: Option<StudioId>,

    /// The subscription being billed.
    pub subscription_id: String,

    /// The subscription tier, the key into the feature configuration.
    pub subscription_type: String,

    /// Start of the current billing period, epoch milliseconds.
    pub current_period_start_ms: Option<i64>,

    /// End of the current billing period, epoch milliseconds.
    pub current_period_end_ms: Option<i64>,
}

impl SubscriberUsage {
    /// Length of the current billing period, when both bounds are
    /// known and ordered.
    #[must_use]
    pub fn period_length_ms(&self) -> Option<i64> {
        match (self.current_period_start_ms, self.current_period_end_ms) {
            (Some(start), Some(end)) if end > start => Some(end - start),
            _ => None,
        }
    }
}

/// Per-subscriber instance usage aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstMetrics {
    /// Who and which period.
    #[serde(flatten)]
    pub subscriber: SubscriberUsage,

    /// Total instances held.
    pub total_insts: u64,

    /// Total bytes of instance storage held.
    pub total_inst_bytes: u64,
}

/// Per-subscriber file-storage usage aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetrics {
    /// Who and which period.
    #[serde(flatten)]
    pub subscriber: SubscriberUsage,

    /// Total files held.
    pub total_files: u64,

    /// Total bytes of file storage reserved.
    pub total_file_bytes_reserved: u64,
}

/// Source of per-subscriber usage aggregates.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// All subscribers' instance usage.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is unreachable; an unreachable
    /// source aborts the whole job so the scheduler retries it.
    async fn all_subscription_inst_metrics(&self) -> Result<Vec<InstMetrics>>;

    /// All subscribers' file-storage usage.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is unreachable; an unreachable
    /// source aborts the whole job so the scheduler retries it.
    async fn all_file_subscription_metrics(&self) -> Result<Vec<FileMetrics>>;
}
