//! Database models for browser push subscriptions.

use crate::types::{StaffId, SuperAdminId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct PushSubscriptionDBResponse {
    pub id: i64,
    pub staff_id: Option<StaffId>,
    pub super_admin_id: Option<SuperAdminId>,
    /// Subscription object exactly as the browser produced it
    pub subscription_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
