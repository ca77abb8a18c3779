//! Membership subscriptions, one row per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Plan granted by a paid membership checkout.
pub const MEMBERSHIP_PLAN: &str = "premium";

/// Status written when a membership checkout reconciles.
pub const STATUS_ACTIVE: &str = "active";

/// A user's membership subscription.
///
/// `user_id` is unique: reconciling again updates this row in place.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub plan: String,
    pub status: String,

    /// Customer id assigned by the payment provider.
    pub provider_customer_id: Option<String>,

    /// Subscription id assigned by the payment provider.
    pub provider_subscription_id: Option<String>,

    /// Most recent checkout that activated this subscription.
    pub checkout_id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
