//! Database models for subsidy programs.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct SubsidyCreateDBRequest {
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct SubsidyDBResponse {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
