//! Database repository for admissions leads and their student/parent details.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    models::leads::{
        LeadCreateDBRequest, LeadDBResponse, LeadParentDBResponse, LeadParentUpdate, LeadStudentDBResponse, LeadStudentUpdate,
    },
};
use crate::types::LeadId;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

// Lead row without children
#[derive(Debug, Clone, FromRow)]
struct Lead {
    id: LeadId,
    secure_token: String,
    status: String,
    payment_status: String,
    expected_start_date: Option<NaiveDate>,
    amount: Option<Decimal>,
    policy_agreed: bool,
    internal_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Lead {
    fn with_children(self, students: Vec<LeadStudentDBResponse>, parents: Vec<LeadParentDBResponse>) -> LeadDBResponse {
        LeadDBResponse {
            id: self.id,
            secure_token: self.secure_token,
            status: self.status,
            payment_status: self.payment_status,
            expected_start_date: self.expected_start_date,
            amount: self.amount,
            policy_agreed: self.policy_agreed,
            internal_notes: self.internal_notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            students,
            parents,
        }
    }
}

pub struct Leads<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Leads<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Attach students and parents to a batch of leads, preserving the batch order
    async fn load_children(&mut self, leads: Vec<Lead>) -> Result<Vec<LeadDBResponse>> {
        let ids: Vec<LeadId> = leads.iter().map(|l| l.id).collect();

        let students = sqlx::query_as::<_, LeadStudentDBResponse>("SELECT * FROM lead_students WHERE lead_id = ANY($1) ORDER BY id")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        let parents = sqlx::query_as::<_, LeadParentDBResponse>("SELECT * FROM lead_parents WHERE lead_id = ANY($1) ORDER BY id")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        let mut students_by_lead: HashMap<LeadId, Vec<LeadStudentDBResponse>> = HashMap::new();
        for student in students {
            students_by_lead.entry(student.lead_id).or_default().push(student);
        }
        let mut parents_by_lead: HashMap<LeadId, Vec<LeadParentDBResponse>> = HashMap::new();
        for parent in parents {
            parents_by_lead.entry(parent.lead_id).or_default().push(parent);
        }

        Ok(leads
            .into_iter()
            .map(|lead| {
                let students = students_by_lead.remove(&lead.id).unwrap_or_default();
                let parents = parents_by_lead.remove(&lead.id).unwrap_or_default();
                lead.with_children(students, parents)
            })
            .collect())
    }

    async fn load_one(&mut self, lead: Option<Lead>) -> Result<Option<LeadDBResponse>> {
        match lead {
            Some(lead) => Ok(self.load_children(vec![lead]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Insert a lead with a fresh secure token, plus its students and parents
    #[instrument(skip(self, request), fields(students = request.students.len(), parents = request.parents.len()), err)]
    pub async fn create(&mut self, request: &LeadCreateDBRequest) -> Result<LeadDBResponse> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (secure_token, expected_start_date, amount, policy_agreed)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(request.expected_start_date)
        .bind(request.amount)
        .bind(request.policy_agreed)
        .fetch_one(&mut *self.db)
        .await?;

        for student in &request.students {
            sqlx::query(
                r#"
                INSERT INTO lead_students (lead_id, first_name, last_name, date_of_birth, city_state, grade_level)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(lead.id)
            .bind(&student.first_name)
            .bind(&student.last_name)
            .bind(student.date_of_birth)
            .bind(&student.city_state)
            .bind(&student.grade_level)
            .execute(&mut *self.db)
            .await?;
        }

        for parent in &request.parents {
            sqlx::query(
                r#"
                INSERT INTO lead_parents (lead_id, first_name, last_name, email, phone)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(lead.id)
            .bind(&parent.first_name)
            .bind(&parent.last_name)
            .bind(&parent.email)
            .bind(&parent.phone)
            .execute(&mut *self.db)
            .await?;
        }

        self.load_one(Some(lead)).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: LeadId) -> Result<Option<LeadDBResponse>> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        self.load_one(lead).await
    }

    #[instrument(skip(self, token), err)]
    pub async fn get_by_token(&mut self, token: &str) -> Result<Option<LeadDBResponse>> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE secure_token = $1")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;

        self.load_one(lead).await
    }

    /// All leads, newest first
    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<LeadDBResponse>> {
        let leads = sqlx::query_as::<_, Lead>("SELECT * FROM leads ORDER BY created_at DESC, id DESC")
            .fetch_all(&mut *self.db)
            .await?;

        self.load_children(leads).await
    }

    /// The `limit` newest leads
    #[instrument(skip(self), err)]
    pub async fn recent(&mut self, limit: i64) -> Result<Vec<LeadDBResponse>> {
        let leads = sqlx::query_as::<_, Lead>("SELECT * FROM leads ORDER BY created_at DESC, id DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        self.load_children(leads).await
    }

    /// Leads in any of `statuses`, newest first
    #[instrument(skip(self, statuses), err)]
    pub async fn list_by_status(&mut self, statuses: &[&str]) -> Result<Vec<LeadDBResponse>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let leads = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE status = ANY($1) ORDER BY created_at DESC, id DESC")
            .bind(&statuses)
            .fetch_all(&mut *self.db)
            .await?;

        self.load_children(leads).await
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads").fetch_one(&mut *self.db).await?;

        Ok(count)
    }

    /// Update status and/or internal notes; absent fields are kept
    #[instrument(skip(self, internal_notes), err)]
    pub async fn update_status_and_notes(&mut self, id: LeadId, status: Option<&str>, internal_notes: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE leads SET
                status = COALESCE($2, status),
                internal_notes = COALESCE($3, internal_notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(internal_notes)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn set_status(&mut self, id: LeadId, status: &str) -> Result<()> {
        self.update_status_and_notes(id, Some(status), None).await
    }

    /// Update one student of this lead; returns false when the id belongs to another lead
    #[instrument(skip(self, update), fields(student_id = update.id), err)]
    pub async fn update_student(&mut self, lead_id: LeadId, update: &LeadStudentUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE lead_students SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                date_of_birth = COALESCE($5, date_of_birth),
                city_state = COALESCE($6, city_state),
                grade_level = COALESCE($7, grade_level)
            WHERE id = $1 AND lead_id = $2
            "#,
        )
        .bind(update.id)
        .bind(lead_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.date_of_birth)
        .bind(&update.city_state)
        .bind(&update.grade_level)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Update one parent of this lead; returns false when the id belongs to another lead
    #[instrument(skip(self, update), fields(parent_id = update.id), err)]
    pub async fn update_parent(&mut self, lead_id: LeadId, update: &LeadParentUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE lead_parents SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone)
            WHERE id = $1 AND lead_id = $2
            "#,
        )
        .bind(update.id)
        .bind(lead_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(&update.phone)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    pub async fn touch(&mut self, id: LeadId) -> Result<()> {
        sqlx::query("UPDATE leads SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}
