//! Subscription feature configuration: the read-only fee schedule.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fees configured for one resource kind, in credits per billing
/// period.
///
/// `None` for a rate means that dimension is free; a fee of zero is
/// equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceFees {
    /// Fee per item (instance or file) per billing period.
    pub fee_per_count_per_period: Option<i64>,

    /// Fee per kilobyte of storage per billing period.
    pub fee_per_kb_per_period: Option<i64>,
}

/// The feature limits a subscription tier grants.
///
/// A `None` resource means the feature is not allowed for the tier and
/// its usage is not billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeaturesConfiguration {
    /// Instance feature fees, if insts are allowed.
    pub insts: Option<ResourceFees>,

    /// File-storage feature fees, if files are allowed.
    pub files: Option<ResourceFees>,
}

/// Source of per-tier feature configuration.
#[async_trait]
pub trait SubscriptionConfigSource: Send + Sync {
    /// Whether any subscription configuration exists at all.
    ///
    /// When this is false the entire periodic-billing job is skipped;
    /// billing cannot run without fee definitions.
    async fn has_configuration(&self) -> bool;

    /// The feature configuration for a subscription, or `None` when
    /// the tier is unknown.
    async fn subscription_features(
        &self,
        subscription_id: &str,
        subscription_type: &str,
    ) -> Option<FeaturesConfiguration>;
}
