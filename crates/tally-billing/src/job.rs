//! Job descriptors.

use serde::{Deserialize, Serialize};

/// A billing job, as dispatched by the external scheduler.
///
/// The variant set is closed: an unrecognized `type` tag fails to
/// parse, and adding a job is a compile error everywhere the union is
/// matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BillingJob {
    /// Sweep accumulated usage-fee credits into USD revenue.
    #[serde(rename = "financial-revenue-credit-sweep")]
    RevenueCreditSweep,

    /// Charge subscribers prorated usage fees.
    #[serde(rename = "financial-periodic-billing")]
    PeriodicBilling {
        /// Billing time, epoch milliseconds. Defaults to wall clock;
        /// supplying it makes the job deterministic for tests.
        #[serde(rename = "nowMs", default, skip_serializing_if = "Option::is_none")]
        now_ms: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_wire_tag() {
        let job: BillingJob =
            serde_json::from_str(r#"{ "type": "financial-revenue-credit-sweep" }"#).unwrap();
        assert_eq!(job, BillingJob::RevenueCreditSweep);
    }

    #[test]
    fn periodic_billing_wire_tag_with_now() {
        let job: BillingJob =
            serde_json::from_str(r#"{ "type": "financial-periodic-billing", "nowMs": 42 }"#)
                .unwrap();
        assert_eq!(job, BillingJob::PeriodicBilling { now_ms: Some(42) });
    }

    #[test]
    fn periodic_billing_now_defaults_to_none() {
        let job: BillingJob =
            serde_json::from_str(r#"{ "type": "financial-periodic-billing" }"#).unwrap();
        assert_eq!(job, BillingJob::PeriodicBilling { now_ms: None });
    }

    #[test]
    fn unknown_job_type_fails_to_parse() {
        let result = serde_json::from_str::<BillingJob>(r#"{ "type": "financial-unknown" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn serialize_uses_wire_tags() {
        let json = serde_json::to_string(&BillingJob::RevenueCreditSweep).unwrap();
        assert!(json.contains("financial-revenue-credit-sweep"));

        let json =
            serde_json::to_string(&BillingJob::PeriodicBilling { now_ms: None }).unwrap();
        assert!(json.contains("financial-periodic-billing"));
        assert!(!json.contains("nowMs"));
    }
}
