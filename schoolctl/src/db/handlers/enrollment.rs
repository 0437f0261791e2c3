//! Database repositories for enrollment forms and the submissions sent to families.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::enrollment::{
        DRAFT_FORM_STATUS, EnrollmentFormCreateDBRequest, EnrollmentFormDBResponse, EnrollmentFormUpdateDBRequest,
        SubmissionDBResponse,
    },
};
use crate::types::{FormId, LeadId, SubmissionId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct EnrollmentFormFilter {
    pub status: Option<String>,
}

pub struct EnrollmentForms<'c> {
    db: &'c mut PgConnection,
}

impl<'c> EnrollmentForms<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Duplicate a form as a new Draft named `{name} (Copy)`
    #[instrument(skip(self), err)]
    pub async fn copy(&mut self, id: FormId) -> Result<Option<EnrollmentFormDBResponse>> {
        let copy = sqlx::query_as::<_, EnrollmentFormDBResponse>(
            r#"
            INSERT INTO enrollment_forms (name, status, form_structure_json, collect_fee, fee_amount, recipient_type)
            SELECT name || ' (Copy)', $2, form_structure_json, collect_fee, fee_amount, recipient_type
            FROM enrollment_forms WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(DRAFT_FORM_STATUS)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(copy)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for EnrollmentForms<'c> {
    type CreateRequest = EnrollmentFormCreateDBRequest;
    type UpdateRequest = EnrollmentFormUpdateDBRequest;
    type Response = EnrollmentFormDBResponse;
    type Id = FormId;
    type Filter = EnrollmentFormFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let form = sqlx::query_as::<_, EnrollmentFormDBResponse>(
            r#"
            INSERT INTO enrollment_forms (name, status, form_structure_json, collect_fee, fee_amount, recipient_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.status)
        .bind(&request.form_structure_json)
        .bind(request.collect_fee)
        .bind(request.fee_amount)
        .bind(&request.recipient_type)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(form)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let form = sqlx::query_as::<_, EnrollmentFormDBResponse>("SELECT * FROM enrollment_forms WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(form)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let forms = sqlx::query_as::<_, EnrollmentFormDBResponse>("SELECT * FROM enrollment_forms WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(forms.into_iter().map(|f| (f.id, f)).collect())
    }

    /// Most recently edited first
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let forms = sqlx::query_as::<_, EnrollmentFormDBResponse>(
            "SELECT * FROM enrollment_forms WHERE ($1::text IS NULL OR status = $1) ORDER BY updated_at DESC, id DESC",
        )
        .bind(&filter.status)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(forms)
    }

    /// Submissions for the form are removed with it
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM enrollment_forms WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let form = sqlx::query_as::<_, EnrollmentFormDBResponse>(
            r#"
            UPDATE enrollment_forms SET
                name = COALESCE($2, name),
                status = COALESCE($3, status),
                form_structure_json = COALESCE($4, form_structure_json),
                collect_fee = COALESCE($5, collect_fee),
                fee_amount = COALESCE($6, fee_amount),
                recipient_type = COALESCE($7, recipient_type),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.status)
        .bind(&request.form_structure_json)
        .bind(request.collect_fee)
        .bind(request.fee_amount)
        .bind(&request.recipient_type)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(form)
    }
}

const SELECT_SUBMISSIONS: &str = r#"
    SELECT
        sub.*,
        f.name AS form_name,
        ls.first_name || ' ' || ls.last_name AS lead_student_name,
        ls.first_name AS lead_student_first_name
    FROM enrollment_submissions sub
    JOIN enrollment_forms f ON f.id = sub.form_id
    LEFT JOIN LATERAL (
        SELECT first_name, last_name FROM lead_students
        WHERE lead_id = sub.lead_id
        ORDER BY id
        LIMIT 1
    ) ls ON TRUE
"#;

pub struct EnrollmentSubmissions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> EnrollmentSubmissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Newest sent first
    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<SubmissionDBResponse>> {
        let submissions = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "{SELECT_SUBMISSIONS} ORDER BY sub.sent_at DESC, sub.id DESC"
        ))
        .fetch_all(&mut *self.db)
        .await?;

        Ok(submissions)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: SubmissionId) -> Result<Option<SubmissionDBResponse>> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!("{SELECT_SUBMISSIONS} WHERE sub.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(submission)
    }

    #[instrument(skip_all, err)]
    pub async fn get_by_token(&mut self, token: &str) -> Result<Option<SubmissionDBResponse>> {
        let submission =
            sqlx::query_as::<_, SubmissionDBResponse>(&format!("{SELECT_SUBMISSIONS} WHERE sub.secure_token = $1"))
                .bind(token)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(submission)
    }

    /// Create a submission for the form and lead unless one already exists; returns the new one
    #[instrument(skip(self), err)]
    pub async fn create_if_absent(&mut self, form_id: FormId, lead_id: LeadId) -> Result<Option<SubmissionDBResponse>> {
        let id: Option<SubmissionId> = sqlx::query_scalar(
            r#"
            INSERT INTO enrollment_submissions (secure_token, form_id, lead_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (form_id, lead_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(form_id)
        .bind(lead_id)
        .fetch_optional(&mut *self.db)
        .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, id: SubmissionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM enrollment_submissions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a `Sent` submission to `Opened`; later states are left alone
    #[instrument(skip(self), err)]
    pub async fn mark_opened(&mut self, id: SubmissionId) -> Result<bool> {
        let result = sqlx::query("UPDATE enrollment_submissions SET status = 'Opened' WHERE id = $1 AND status = 'Sent'")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Store the family's responses. A paid submission is `Completed`, otherwise `Submitted`.
    ///
    /// Returns false when the submission was already closed.
    #[instrument(skip(self, responses), err)]
    pub async fn submit(&mut self, id: SubmissionId, responses: &serde_json::Value, paid: bool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE enrollment_submissions SET
                responses_json = $2,
                status = CASE WHEN $3 THEN 'Completed' ELSE 'Submitted' END,
                payment_status = CASE WHEN $3 THEN 'Paid' ELSE payment_status END,
                submitted_at = NOW()
            WHERE id = $1 AND status NOT IN ('Submitted', 'Completed')
            "#,
        )
        .bind(id)
        .bind(responses)
        .bind(paid)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
