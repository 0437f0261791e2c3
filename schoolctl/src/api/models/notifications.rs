//! API models for notifications and push subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::notifications::NotificationDBResponse;
use crate::types::NotificationId;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    pub id: NotificationId,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub target_link: Option<String>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            message: db.message,
            is_read: db.is_read,
            created_at: db.created_at,
            target_type: db.target_type,
            target_id: db.target_id,
            target_link: db.target_link,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub message: String,
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VapidKeyResponse {
    #[serde(rename = "publicKey")]
    pub public_key: String,
}
