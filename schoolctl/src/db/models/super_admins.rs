//! Database models for the super administrator.

use crate::types::SuperAdminId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating the super admin
#[derive(Debug, Clone)]
pub struct SuperAdminCreateDBRequest {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Database response for the super admin
#[derive(Debug, Clone, FromRow)]
pub struct SuperAdminDBResponse {
    pub id: SuperAdminId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A registration waiting for its emailed verification code
#[derive(Debug, Clone, FromRow)]
pub struct PendingRegistration {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub otp_hash: String,
    pub created_at: DateTime<Utc>,
}
