//! API request/response models for tasks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::tasks::TaskDBResponse;
use crate::types::{DepartmentId, LeadId, StaffId, TaskId};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TaskCreate {
    pub title: Option<String>,
    pub note: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub lead_id: Option<LeadId>,
    pub assigned_department_ids: Vec<DepartmentId>,
    pub assigned_staff_ids: Vec<StaffId>,
}

/// Edit a task. `due_date` is cleared when absent; assignments are replaced only when given.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub note: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    /// Also move the task's lead to this status
    pub lead_status: Option<String>,
    pub assigned_department_ids: Option<Vec<DepartmentId>>,
    pub assigned_staff_ids: Option<Vec<StaffId>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TaskStatusUpdate {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskCount {
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    pub id: TaskId,
    pub title: String,
    pub note: Option<String>,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub lead_id: LeadId,
    pub lead_secure_token: String,
    pub lead_student_name: Option<String>,
    pub created_by_staff_id: StaffId,
    pub created_by_staff_name: String,
    pub created_at: DateTime<Utc>,
    pub assigned_department_ids: Vec<DepartmentId>,
    pub assigned_department_names: Vec<String>,
    pub assigned_staff_ids: Vec<StaffId>,
    pub assigned_staff_names: Vec<String>,
}

impl From<TaskDBResponse> for TaskResponse {
    fn from(db: TaskDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            note: db.note,
            status: db.status,
            due_date: db.due_date,
            lead_id: db.lead_id,
            lead_secure_token: db.lead_secure_token,
            lead_student_name: db.lead_student_name,
            created_by_staff_id: db.created_by_staff_id,
            created_by_staff_name: db.created_by_staff_name,
            created_at: db.created_at,
            assigned_department_ids: db.assigned_department_ids,
            assigned_department_names: db.assigned_department_names,
            assigned_staff_ids: db.assigned_staff_ids,
            assigned_staff_names: db.assigned_staff_names,
        }
    }
}

/// Parse a due date given either as an RFC 3339 timestamp or a bare date (midnight UTC).
/// Blank input means no due date.
pub fn parse_due_date(value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(timestamp.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| format!("Invalid due_date: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_due_date() {
        assert_eq!(parse_due_date(None), Ok(None));
        assert_eq!(parse_due_date(Some("  ")), Ok(None));
        assert_eq!(
            parse_due_date(Some("2025-06-01")),
            Ok(Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()))
        );
        assert_eq!(
            parse_due_date(Some("2025-06-01T10:30:00+02:00")),
            Ok(Some(Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()))
        );
        assert!(parse_due_date(Some("next tuesday")).is_err());
    }
}
