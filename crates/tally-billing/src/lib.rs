//! Recurring billing jobs for the tally ledger.
//!
//! An external scheduler invokes [`BillingProcessor::run`] with a
//! [`BillingJob`] descriptor. The processor reads usage metrics and
//! subscription configuration through its collaborator traits, computes
//! prorated fees, and submits transfers through the ledger controller:
//!
//! - **Revenue-credit sweep** converts accumulated usage-fee credits
//!   into USD revenue as an atomic cross-ledger swap.
//! - **Periodic billing** charges every subscriber for instance and
//!   file-storage usage, prorated to the wall-clock time since the last
//!   run. One bad subscriber never blocks billing the rest.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod processor;

pub use config::{FeaturesConfiguration, ResourceFees, SubscriptionConfigSource};
pub use error::{JobError, Result};
pub use job::BillingJob;
pub use metrics::{FileMetrics, InstMetrics, MetricsSource, SubscriberUsage};
pub use processor::BillingProcessor;
