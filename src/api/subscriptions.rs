//! Subscription resource: the recurring charges the service tracks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::dispatcher::{DispatchError, Dispatcher};

// ============================================================================
// Types
// ============================================================================

/// A tracked recurring charge, as returned by the backend.
///
/// `cost_amount` is a fixed-point decimal; the backend serializes it as
/// a string to preserve precision.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// "monthly" | "annual" | "weekly" | "other"
    pub billing_cycle: Option<String>,
    pub confidence_score: Option<f64>,
    pub cost_amount: Option<String>,
    pub cost_currency: String,
    pub detected_at: Option<DateTime<Utc>>,
    pub id: i64,
    pub logo_url: Option<String>,
    pub next_renewal_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub service_name: String,
    /// "detected" | "manual"
    pub source: String,
    /// "active" | "cancelled" | "trial" | "paused"
    pub status: String,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscriptionCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_renewal_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Partial update; absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscriptionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_renewal_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ============================================================================
// Operations
// ============================================================================

pub async fn list(dispatcher: &Dispatcher) -> Result<Vec<Subscription>, DispatchError> {
    dispatcher.get("/api/subscriptions/").await
}

pub async fn get(dispatcher: &Dispatcher, id: i64) -> Result<Subscription, DispatchError> {
    dispatcher.get(&format!("/api/subscriptions/{id}")).await
}

pub async fn create(
    dispatcher: &Dispatcher,
    subscription: &SubscriptionCreate,
) -> Result<Subscription, DispatchError> {
    dispatcher.post("/api/subscriptions/", subscription).await
}

pub async fn update(
    dispatcher: &Dispatcher,
    id: i64,
    changes: &SubscriptionUpdate,
) -> Result<Subscription, DispatchError> {
    dispatcher
        .patch(&format!("/api/subscriptions/{id}"), changes)
        .await
}

pub async fn delete(dispatcher: &Dispatcher, id: i64) -> Result<(), DispatchError> {
    dispatcher.delete(&format!("/api/subscriptions/{id}")).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_wire_format() {
        let json = r#"{
            "id": 3,
            "user_id": 1,
            "service_name": "Streamly",
            "logo_url": null,
            "cost_amount": "9.99",
            "cost_currency": "USD",
            "billing_cycle": "monthly",
            "next_renewal_date": "2026-09-01",
            "status": "active",
            "source": "detected",
            "confidence_score": 0.92,
            "notes": null,
            "detected_at": "2026-08-01T10:30:00+00:00",
            "updated_at": "2026-08-02T08:00:00+00:00"
        }"#;

        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.service_name, "Streamly");
        assert_eq!(sub.cost_amount.as_deref(), Some("9.99"));
        assert_eq!(
            sub.next_renewal_date,
            Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap())
        );
        assert!(sub.detected_at.is_some());
    }

    #[test]
    fn test_create_body_omits_unset_fields() {
        let create = SubscriptionCreate {
            service_name: "Streamly".to_string(),
            cost_amount: Some(9.99),
            ..Default::default()
        };

        let body = serde_json::to_value(&create).unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("service_name"));
        assert!(object.contains_key("cost_amount"));
    }
}
