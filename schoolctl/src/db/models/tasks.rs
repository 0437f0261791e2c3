//! Database models for tasks.

use crate::types::{DepartmentId, LeadId, StaffId, TaskId};
use chrono::{DateTime, Utc};

pub const DEFAULT_TASK_STATUS: &str = "To-Do";
pub const COMPLETED_TASK_STATUS: &str = "Completed";

/// Database request for creating a task
#[derive(Debug, Clone)]
pub struct TaskCreateDBRequest {
    pub title: String,
    pub note: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub lead_id: LeadId,
    pub created_by_staff_id: StaffId,
    pub department_ids: Vec<DepartmentId>,
    pub staff_ids: Vec<StaffId>,
}

/// Database request for updating a task.
///
/// `due_date` is written as given, so `None` clears it.
#[derive(Debug, Clone)]
pub struct TaskUpdateDBRequest {
    pub title: Option<String>,
    pub note: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

/// Database response for a task with its assignments and lead context resolved
#[derive(Debug, Clone)]
pub struct TaskDBResponse {
    pub id: TaskId,
    pub title: String,
    pub note: Option<String>,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub lead_id: LeadId,
    pub created_by_staff_id: StaffId,
    pub created_by_staff_name: String,
    pub created_at: DateTime<Utc>,
    pub assigned_department_ids: Vec<DepartmentId>,
    pub assigned_department_names: Vec<String>,
    pub assigned_staff_ids: Vec<StaffId>,
    pub assigned_staff_names: Vec<String>,
    pub lead_secure_token: String,
    pub lead_student_name: Option<String>,
}
