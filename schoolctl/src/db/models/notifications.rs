//! Database models for in-app notifications.

use crate::types::{NotificationId, StaffId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub staff_id: StaffId,
    pub message: String,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub target_link: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub staff_id: StaffId,
    pub message: String,
    pub is_read: bool,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub target_link: Option<String>,
    pub created_at: DateTime<Utc>,
}
