//! API request/response models for subsidy programs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::subsidies::SubsidyDBResponse;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SubsidyCreate {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubsidyResponse {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SubsidyDBResponse> for SubsidyResponse {
    fn from(db: SubsidyDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            is_active: db.is_active,
            created_at: db.created_at,
        }
    }
}
