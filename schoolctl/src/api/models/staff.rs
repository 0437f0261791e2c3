//! API request/response models for staff members.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::staff::StaffDBResponse;
use crate::types::{DepartmentId, StaffId};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StaffCreate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub department_ids: Vec<DepartmentId>,
}

/// Partial update; `department_ids` replaces the whole membership list
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StaffUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub department_ids: Option<Vec<DepartmentId>>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffResponse {
    pub id: StaffId,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub department_ids: Vec<DepartmentId>,
    pub department_names: Vec<String>,
}

impl From<StaffDBResponse> for StaffResponse {
    fn from(db: StaffDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            is_active: db.is_active,
            created_at: db.created_at,
            department_ids: db.department_ids,
            department_names: db.department_names,
        }
    }
}
