//! API request/response models for departments.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::departments::DepartmentDBResponse;
use crate::types::DepartmentId;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct DepartmentCreate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dashboard_route: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct DepartmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dashboard_route: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepartmentResponse {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub dashboard_route: Option<String>,
    pub is_active: bool,
}

impl From<DepartmentDBResponse> for DepartmentResponse {
    fn from(db: DepartmentDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            dashboard_route: db.dashboard_route,
            is_active: db.is_active,
        }
    }
}
