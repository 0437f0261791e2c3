//! Database repository for tasks and their department/staff assignments.

use crate::db::{
    errors::{DbError, Result},
    models::tasks::{COMPLETED_TASK_STATUS, TaskCreateDBRequest, TaskDBResponse, TaskUpdateDBRequest},
};
use crate::types::{DepartmentId, LeadId, StaffId, TaskId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: TaskId,
    title: String,
    note: Option<String>,
    status: String,
    due_date: Option<DateTime<Utc>>,
    lead_id: LeadId,
    created_by_staff_id: StaffId,
    created_by_staff_name: String,
    created_at: DateTime<Utc>,
    assigned_department_ids: Vec<DepartmentId>,
    assigned_department_names: Vec<String>,
    assigned_staff_ids: Vec<StaffId>,
    assigned_staff_names: Vec<String>,
    lead_secure_token: String,
    lead_student_name: Option<String>,
}

impl From<TaskRow> for TaskDBResponse {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            note: row.note,
            status: row.status,
            due_date: row.due_date,
            lead_id: row.lead_id,
            created_by_staff_id: row.created_by_staff_id,
            created_by_staff_name: row.created_by_staff_name,
            created_at: row.created_at,
            assigned_department_ids: row.assigned_department_ids,
            assigned_department_names: row.assigned_department_names,
            assigned_staff_ids: row.assigned_staff_ids,
            assigned_staff_names: row.assigned_staff_names,
            lead_secure_token: row.lead_secure_token,
            lead_student_name: row.lead_student_name,
        }
    }
}

const SELECT_TASKS: &str = r#"
    SELECT
        t.id, t.title, t.note, t.status, t.due_date, t.lead_id, t.created_by_staff_id, t.created_at,
        creator.name AS created_by_staff_name,
        COALESCE((SELECT array_agg(d.id ORDER BY d.name) FROM task_departments td JOIN departments d ON d.id = td.department_id WHERE td.task_id = t.id), '{}') AS assigned_department_ids,
        COALESCE((SELECT array_agg(d.name ORDER BY d.name) FROM task_departments td JOIN departments d ON d.id = td.department_id WHERE td.task_id = t.id), '{}') AS assigned_department_names,
        COALESCE((SELECT array_agg(s.id ORDER BY s.name) FROM task_staff ts JOIN staff s ON s.id = ts.staff_id WHERE ts.task_id = t.id), '{}') AS assigned_staff_ids,
        COALESCE((SELECT array_agg(s.name ORDER BY s.name) FROM task_staff ts JOIN staff s ON s.id = ts.staff_id WHERE ts.task_id = t.id), '{}') AS assigned_staff_names,
        l.secure_token AS lead_secure_token,
        (SELECT ls.first_name || ' ' || ls.last_name FROM lead_students ls WHERE ls.lead_id = l.id ORDER BY ls.id LIMIT 1) AS lead_student_name
    FROM tasks t
    JOIN staff creator ON creator.id = t.created_by_staff_id
    JOIN leads l ON l.id = t.lead_id
"#;

// Tasks assigned to the member directly or through one of their departments
const ASSIGNED_TO_STAFF: &str = r#"
    (EXISTS (SELECT 1 FROM task_staff ts WHERE ts.task_id = t.id AND ts.staff_id = $1)
     OR EXISTS (
        SELECT 1 FROM task_departments td
        JOIN staff_departments sd ON sd.department_id = td.department_id
        WHERE td.task_id = t.id AND sd.staff_id = $1
     ))
"#;

pub struct Tasks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tasks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(lead_id = request.lead_id), err)]
    pub async fn create(&mut self, request: &TaskCreateDBRequest) -> Result<TaskDBResponse> {
        let id: TaskId = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (title, note, due_date, lead_id, created_by_staff_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&request.title)
        .bind(&request.note)
        .bind(request.due_date)
        .bind(request.lead_id)
        .bind(request.created_by_staff_id)
        .fetch_one(&mut *self.db)
        .await?;

        self.insert_assignments(id, &request.department_ids, &request.staff_ids).await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn insert_assignments(&mut self, task_id: TaskId, department_ids: &[DepartmentId], staff_ids: &[StaffId]) -> Result<()> {
        sqlx::query(
            "INSERT INTO task_departments (task_id, department_id) SELECT $1, unnest($2::bigint[]) ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(department_ids)
        .execute(&mut *self.db)
        .await?;

        sqlx::query("INSERT INTO task_staff (task_id, staff_id) SELECT $1, unnest($2::bigint[]) ON CONFLICT DO NOTHING")
            .bind(task_id)
            .bind(staff_ids)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Replace both assignment lists
    #[instrument(skip(self, department_ids, staff_ids), err)]
    pub async fn replace_assignments(&mut self, task_id: TaskId, department_ids: &[DepartmentId], staff_ids: &[StaffId]) -> Result<()> {
        sqlx::query("DELETE FROM task_departments WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *self.db)
            .await?;
        sqlx::query("DELETE FROM task_staff WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *self.db)
            .await?;

        self.insert_assignments(task_id, department_ids, staff_ids).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: TaskId) -> Result<Option<TaskDBResponse>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!("{SELECT_TASKS} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.map(TaskDBResponse::from))
    }

    /// Title, note and status keep their value when absent; due date is always overwritten
    #[instrument(skip(self, request), err)]
    pub async fn update(&mut self, id: TaskId, request: &TaskUpdateDBRequest) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                title = COALESCE($2, title),
                note = COALESCE($3, note),
                due_date = $4,
                status = COALESCE($5, status)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.note)
        .bind(request.due_date)
        .bind(&request.status)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn set_status(&mut self, id: TaskId, status: &str) -> Result<()> {
        let result = sqlx::query("UPDATE tasks SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Tasks assigned to the member directly or through their departments, soonest due first
    #[instrument(skip(self), err)]
    pub async fn list_for_staff(&mut self, staff_id: StaffId) -> Result<Vec<TaskDBResponse>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "{SELECT_TASKS} WHERE {ASSIGNED_TO_STAFF} ORDER BY t.due_date ASC NULLS LAST, t.created_at DESC"
        ))
        .bind(staff_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(TaskDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn count_open_for_staff(&mut self, staff_id: StaffId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM tasks t WHERE {ASSIGNED_TO_STAFF} AND t.status <> $2"
        ))
        .bind(staff_id)
        .bind(COMPLETED_TASK_STATUS)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_lead(&mut self, lead_id: LeadId) -> Result<Vec<TaskDBResponse>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!("{SELECT_TASKS} WHERE t.lead_id = $1 ORDER BY t.created_at DESC"))
            .bind(lead_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(TaskDBResponse::from).collect())
    }
}
