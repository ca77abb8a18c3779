//! Checkout sessions as reported by the payment provider.

use crate::models::metadata::MetadataMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Business workflow a checkout belongs to.
///
/// Written into checkout metadata at creation time and verified at callback
/// time so a checkout paid for one product cannot complete another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Membership,
    JobPosting,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Membership => "membership",
            Self::JobPosting => "job_posting",
        }
    }

    /// Path segment used in callback URLs (`/checkout/{segment}/callback`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Membership => "membership",
            Self::JobPosting => "job-posting",
        }
    }

    /// Membership checkouts accept discount codes; job postings are full price.
    pub fn allows_discount_codes(&self) -> bool {
        matches!(self, Self::Membership)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-reported checkout status.
///
/// Statuses the service does not know are kept verbatim in `Unknown` so
/// rejections can name them; an absent status is `Unknown("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStatus {
    Open,
    Pending,
    Confirmed,
    Succeeded,
    Failed,
    Expired,
    Unknown(String),
}

impl CheckoutStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "open" => Self::Open,
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "expired" => Self::Expired,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Unknown(raw) if raw.is_empty() => "missing",
            Self::Unknown(raw) => raw,
        }
    }

    /// Only `succeeded` and `confirmed` count as paid.
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Confirmed)
    }
}

impl Default for CheckoutStatus {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl<'de> Deserialize<'de> for CheckoutStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

/// A checkout as returned by the provider's retrieve endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRecord {
    pub id: String,
    #[serde(default)]
    pub status: CheckoutStatus,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: MetadataMap,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Parameters for creating a checkout with the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCheckout {
    pub product_id: String,
    pub success_url: String,
    pub metadata: MetadataMap,
    pub allow_discount_codes: bool,
}

/// Newly created checkout: id plus the hosted payment page URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    #[serde(rename = "checkout_id", alias = "id")]
    pub id: String,
    pub url: String,
}

// Providers echo metadata as a JSON object whose values may be strings,
// numbers or booleans; everything is normalized to strings and nulls dropped.
fn deserialize_metadata<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MetadataMap, D::Error> {
    let raw = Option::<serde_json::Map<String, serde_json::Value>>::deserialize(deserializer)?;
    let mut map = MetadataMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let value = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        map.insert_raw(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_succeeded_and_confirmed_are_paid() {
        assert!(CheckoutStatus::parse("succeeded").is_paid());
        assert!(CheckoutStatus::parse("confirmed").is_paid());
        for raw in ["pending", "failed", "open", "expired", "refunded", ""] {
            assert!(!CheckoutStatus::parse(raw).is_paid(), "{raw} should not be paid");
        }
        assert!(!CheckoutStatus::default().is_paid());
    }

    #[test]
    fn record_tolerates_missing_status_and_mixed_metadata() {
        let record: CheckoutRecord = serde_json::from_value(json!({
            "id": "chk_1",
            "metadata": {"custom_flow": "membership", "job_salary_min": 1000, "job_receive_emails": true, "gone": null}
        }))
        .unwrap();

        assert_eq!(record.status, CheckoutStatus::Unknown(String::new()));
        assert_eq!(record.status.as_str(), "missing");
        assert_eq!(record.metadata.get("custom_flow"), Some("membership"));
        assert_eq!(record.metadata.get("job_salary_min"), Some("1000"));
        assert_eq!(record.metadata.get("job_receive_emails"), Some("true"));
        assert_eq!(record.metadata.get("gone"), None);
        assert!(record.subscription_id.is_none());
    }

    #[test]
    fn null_status_is_unknown() {
        let record: CheckoutRecord =
            serde_json::from_value(json!({"id": "chk_2", "status": null, "metadata": null})).unwrap();
        assert!(!record.status.is_paid());
        assert!(record.metadata.is_empty());
    }
}
