//! Database models for departments.

use crate::types::DepartmentId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating a department
#[derive(Debug, Clone)]
pub struct DepartmentCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub dashboard_route: Option<String>,
}

/// Database request for updating a department
#[derive(Debug, Clone, Default)]
pub struct DepartmentUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dashboard_route: Option<String>,
    pub is_active: Option<bool>,
}

/// Database response for a department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DepartmentDBResponse {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub dashboard_route: Option<String>,
    pub is_active: bool,
}
