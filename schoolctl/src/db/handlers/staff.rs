//! Database repository for staff members.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::staff::{StaffContact, StaffCreateDBRequest, StaffDBResponse, StaffUpdateDBRequest},
};
use crate::types::{DepartmentId, StaffId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing staff
#[derive(Debug, Clone, Default)]
pub struct StaffFilter {
    pub active_only: bool,
}

// Staff row with memberships folded into arrays
#[derive(Debug, Clone, FromRow)]
struct StaffRow {
    id: StaffId,
    name: String,
    email: String,
    password_hash: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    department_ids: Vec<DepartmentId>,
    department_names: Vec<String>,
    dashboard_routes: Vec<String>,
}

impl From<StaffRow> for StaffDBResponse {
    fn from(row: StaffRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active,
            created_at: row.created_at,
            department_ids: row.department_ids,
            department_names: row.department_names,
            dashboard_routes: row.dashboard_routes,
        }
    }
}

const SELECT_STAFF: &str = r#"
    SELECT
        s.id, s.name, s.email, s.password_hash, s.is_active, s.created_at,
        COALESCE(array_agg(d.id ORDER BY d.name) FILTER (WHERE d.id IS NOT NULL), '{}') AS department_ids,
        COALESCE(array_agg(d.name ORDER BY d.name) FILTER (WHERE d.id IS NOT NULL), '{}') AS department_names,
        COALESCE(array_agg(d.dashboard_route ORDER BY d.name) FILTER (WHERE d.dashboard_route IS NOT NULL), '{}') AS dashboard_routes
    FROM staff s
    LEFT JOIN staff_departments sd ON sd.staff_id = s.id
    LEFT JOIN departments d ON d.id = sd.department_id
"#;

pub struct Staff<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Staff<'c> {
    type CreateRequest = StaffCreateDBRequest;
    type UpdateRequest = StaffUpdateDBRequest;
    type Response = StaffDBResponse;
    type Id = StaffId;
    type Filter = StaffFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: StaffId = sqlx::query_scalar(
            r#"
            INSERT INTO staff (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        self.set_departments(id, &request.department_ids).await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, StaffRow>(&format!("{SELECT_STAFF} WHERE s.id = $1 GROUP BY s.id"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.map(StaffDBResponse::from))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, StaffRow>(&format!("{SELECT_STAFF} WHERE s.id = ANY($1) GROUP BY s.id"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(|row| (row.id, StaffDBResponse::from(row))).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as::<_, StaffRow>(&format!(
            "{SELECT_STAFF} WHERE (NOT $1 OR s.is_active) GROUP BY s.id ORDER BY s.name"
        ))
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(StaffDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM staff WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let result = sqlx::query(
            r#"
            UPDATE staff SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                is_active = COALESCE($4, is_active),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.is_active)
        .bind(&request.password_hash)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        if let Some(department_ids) = &request.department_ids {
            sqlx::query("DELETE FROM staff_departments WHERE staff_id = $1")
                .bind(id)
                .execute(&mut *self.db)
                .await?;
            self.set_departments(id, department_ids).await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Staff<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn set_departments(&mut self, staff_id: StaffId, department_ids: &[DepartmentId]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO staff_departments (staff_id, department_id)
            SELECT $1, unnest($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(staff_id)
        .bind(department_ids)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Case-insensitive lookup used by login
    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<StaffDBResponse>> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "{SELECT_STAFF} WHERE LOWER(s.email) = LOWER($1) GROUP BY s.id"
        ))
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(StaffDBResponse::from))
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, active_only: bool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staff WHERE (NOT $1 OR is_active)")
            .bind(active_only)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Lowest staff id, used as the nominal creator of tasks created by the super admin
    #[instrument(skip(self), err)]
    pub async fn first_staff_id(&mut self) -> Result<Option<StaffId>> {
        let id: Option<StaffId> = sqlx::query_scalar("SELECT id FROM staff ORDER BY id LIMIT 1")
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(id)
    }

    /// Active staff in any of the named departments
    #[instrument(skip(self), err)]
    pub async fn contacts_in_department_named(&mut self, department_name: &str) -> Result<Vec<StaffContact>> {
        let contacts = sqlx::query_as::<_, StaffContact>(
            r#"
            SELECT DISTINCT s.id, s.name, s.email
            FROM staff s
            JOIN staff_departments sd ON sd.staff_id = s.id
            JOIN departments d ON d.id = sd.department_id
            WHERE d.name = $1 AND s.is_active
            ORDER BY s.id
            "#,
        )
        .bind(department_name)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(contacts)
    }

    /// Union of everyone in `department_ids` and the explicit `staff_ids`, each listed once
    #[instrument(skip(self, department_ids, staff_ids), err)]
    pub async fn contacts_for_assignment(&mut self, department_ids: &[DepartmentId], staff_ids: &[StaffId]) -> Result<Vec<StaffContact>> {
        let contacts = sqlx::query_as::<_, StaffContact>(
            r#"
            SELECT s.id, s.name, s.email
            FROM staff s
            WHERE s.is_active AND (
                s.id = ANY($2)
                OR EXISTS (
                    SELECT 1 FROM staff_departments sd
                    WHERE sd.staff_id = s.id AND sd.department_id = ANY($1)
                )
            )
            ORDER BY s.id
            "#,
        )
        .bind(department_ids)
        .bind(staff_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(contacts)
    }

    #[instrument(skip(self, ids), err)]
    pub async fn contacts_by_ids(&mut self, ids: &[StaffId]) -> Result<Vec<StaffContact>> {
        let contacts = sqlx::query_as::<_, StaffContact>("SELECT id, name, email FROM staff WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(contacts)
    }
}
