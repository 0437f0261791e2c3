//! Database repository for departments.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::departments::{DepartmentCreateDBRequest, DepartmentDBResponse, DepartmentUpdateDBRequest},
};
use crate::types::DepartmentId;
use sqlx::PgConnection;
use tracing::instrument;

pub const ADMISSION_DEPARTMENT: &str = "Admission Department";
pub const ACCOUNTING_DEPARTMENT: &str = "Accounting Department";
pub const ADMINISTRATION_DEPARTMENT: &str = "Administration Department";

/// Dashboard routes owned by the built-in departments
pub const RESERVED_ROUTES: [&str; 3] = ["/admin/admissions", "/admin/accounting", "/admin/administration"];

/// The departments every school starts with, seeded when the super admin registers
pub const CORE_DEPARTMENTS: [(&str, &str, &str); 3] = [
    (
        ADMISSION_DEPARTMENT,
        "Handles new student applications and leads.",
        "/admin/admissions",
    ),
    (
        ACCOUNTING_DEPARTMENT,
        "Manages finances, payments, and invoices.",
        "/admin/accounting",
    ),
    (
        ADMINISTRATION_DEPARTMENT,
        "General school administration and other operational tasks.",
        "/admin/administration",
    ),
];

pub fn is_reserved_route(route: &str) -> bool {
    RESERVED_ROUTES.contains(&route)
}

/// Filter for listing departments
#[derive(Debug, Clone, Default)]
pub struct DepartmentFilter {
    pub active_only: bool,
}

pub struct Departments<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Departments<'c> {
    type CreateRequest = DepartmentCreateDBRequest;
    type UpdateRequest = DepartmentUpdateDBRequest;
    type Response = DepartmentDBResponse;
    type Id = DepartmentId;
    type Filter = DepartmentFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>(
            r#"
            INSERT INTO departments (name, description, dashboard_route)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.dashboard_route)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(department)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>("SELECT * FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(department)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let departments = sqlx::query_as::<_, DepartmentDBResponse>("SELECT * FROM departments WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(departments.into_iter().map(|d| (d.id, d)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let departments = sqlx::query_as::<_, DepartmentDBResponse>(
            "SELECT * FROM departments WHERE (NOT $1 OR is_active) ORDER BY name",
        )
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(departments)
    }

    /// Staff and task links go with the department (ON DELETE CASCADE on the join tables)
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>(
            r#"
            UPDATE departments SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                dashboard_route = COALESCE($4, dashboard_route),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.dashboard_route)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(department)
    }
}

impl<'c> Departments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<DepartmentDBResponse>> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>("SELECT * FROM departments WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(department)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_dashboard_route(&mut self, route: &str) -> Result<Option<DepartmentDBResponse>> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>("SELECT * FROM departments WHERE dashboard_route = $1")
            .bind(route)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(department)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Create whichever core departments don't exist yet; returns how many were created
    #[instrument(skip(self), err)]
    pub async fn seed_core_departments(&mut self) -> Result<u64> {
        let mut created = 0;
        for (name, description, route) in CORE_DEPARTMENTS {
            let result = sqlx::query(
                r#"
                INSERT INTO departments (name, description, dashboard_route)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(name)
            .bind(description)
            .bind(route)
            .execute(&mut *self.db)
            .await?;
            created += result.rows_affected();
        }

        Ok(created)
    }
}
