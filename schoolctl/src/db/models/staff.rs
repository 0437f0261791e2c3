//! Database models for staff members.

use crate::types::{DepartmentId, StaffId};
use chrono::{DateTime, Utc};

/// Database request for creating a staff member
#[derive(Debug, Clone)]
pub struct StaffCreateDBRequest {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub department_ids: Vec<DepartmentId>,
}

/// Database request for updating a staff member.
///
/// `department_ids`, when present, replaces the full membership list.
#[derive(Debug, Clone, Default)]
pub struct StaffUpdateDBRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub department_ids: Option<Vec<DepartmentId>>,
    pub password_hash: Option<String>,
}

/// Database response for a staff member, with department memberships resolved
#[derive(Debug, Clone)]
pub struct StaffDBResponse {
    pub id: StaffId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub department_ids: Vec<DepartmentId>,
    pub department_names: Vec<String>,
    /// Non-null dashboard routes of the member's departments
    pub dashboard_routes: Vec<String>,
}

/// Minimal contact details, used for notification fan-out
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffContact {
    pub id: StaffId,
    pub name: String,
    pub email: String,
}
