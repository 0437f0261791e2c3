//! Enrollment forms: building them, sending them to admitted families and the public pages
//! families fill them in on.
//!
//! Public pages are addressed by the submission's secure token. Submitting a form converts the
//! lead into a student and tells the accounting department.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::activity_entry,
        models::{
            auth::{CurrentUser, MessageResponse, required},
            enrollment::{
                EnrollmentFormCreate, EnrollmentFormResponse, EnrollmentFormUpdate, PublicSubmissionResponse, PublicSubmit,
                RecipientResponse, RecipientsQuery, SendFormRequest, SubmissionResponse, UNNAMED_STUDENT,
            },
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{
            ActivityLogs, EnrollmentForms, EnrollmentSubmissions, Leads, Repository, Students, departments::ACCOUNTING_DEPARTMENT,
            enrollment::EnrollmentFormFilter, students::ConversionError,
        },
        models::{
            activity::ActivityLogCreateDBRequest,
            enrollment::{
                ACTIVE_FORM_STATUS, DRAFT_FORM_STATUS, EnrollmentFormCreateDBRequest, EnrollmentFormDBResponse,
                NEW_STUDENTS_RECIPIENTS, RETURNING_STUDENTS_RECIPIENTS, SubmissionDBResponse, default_form_structure,
            },
        },
    },
    errors::{Error, Result},
    notifications::{NotificationTarget, notify_department},
    types::{FormId, SubmissionId},
};
use sqlx::PgConnection;

/// Lead statuses that can be sent a new-student enrollment form
const RECIPIENT_LEAD_STATUSES: [&str; 3] = ["Interested", "Toured", "Admitted"];
const UNTITLED_FORM: &str = "Untitled Enrollment Form";

/// A queued invitation, sent once the submission has been committed
#[derive(Debug)]
struct Invitation {
    to_email: String,
    to_name: String,
    student_first_name: String,
    token: String,
}

fn enrollment_path(token: &str) -> String {
    format!("/enrollment/{token}")
}

async fn form_by_id(conn: &mut PgConnection, id: FormId) -> Result<EnrollmentFormDBResponse> {
    EnrollmentForms::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Enrollment form", id))
}

fn validate_form_status(status: Option<&str>) -> Result<()> {
    match status {
        None | Some(ACTIVE_FORM_STATUS) | Some(DRAFT_FORM_STATUS) => Ok(()),
        Some(other) => Err(Error::bad_request(format!("Unknown form status '{other}'"))),
    }
}

#[utoipa::path(
    get,
    path = "/enrollment/forms",
    tag = "enrollment",
    summary = "List enrollment forms",
    responses((status = 200, description = "Forms, most recently edited first", body = Vec<EnrollmentFormResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_forms(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Enrollment, operation::ReadAll>,
) -> Result<Json<Vec<EnrollmentFormResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let forms = EnrollmentForms::new(&mut conn).list(&EnrollmentFormFilter::default()).await?;
    Ok(Json(forms.into_iter().map(Into::into).collect()))
}

/// New forms start as a Draft with the standard four sections unless a structure is given
#[utoipa::path(
    post,
    path = "/enrollment/forms",
    request_body = EnrollmentFormCreate,
    tag = "enrollment",
    summary = "Create an enrollment form",
    responses((status = 201, description = "Form created", body = EnrollmentFormResponse)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_form(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Enrollment, operation::CreateAll>,
    Json(request): Json<EnrollmentFormCreate>,
) -> Result<(StatusCode, Json<EnrollmentFormResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let form = EnrollmentForms::new(&mut tx)
        .create(&EnrollmentFormCreateDBRequest {
            name: required(&request.name).unwrap_or(UNTITLED_FORM).to_string(),
            status: DRAFT_FORM_STATUS.to_string(),
            form_structure_json: request
                .form_structure_json
                .filter(|s| !s.is_null())
                .unwrap_or_else(default_form_structure),
            collect_fee: request.collect_fee.unwrap_or(false),
            fee_amount: request.fee_amount,
            recipient_type: required(&request.recipient_type).unwrap_or(NEW_STUDENTS_RECIPIENTS).to_string(),
        })
        .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Created enrollment form '{}'", form.name)).with_target(
                "EnrollmentForm",
                form.id,
                &form.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(form.into())))
}

#[utoipa::path(
    get,
    path = "/enrollment/forms/{id}",
    tag = "enrollment",
    summary = "Get an enrollment form",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 200, description = "The form", body = EnrollmentFormResponse),
        (status = 404, description = "Form not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    _: RequiresPermission<resource::Enrollment, operation::ReadAll>,
) -> Result<Json<EnrollmentFormResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(form_by_id(&mut conn, id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/enrollment/forms/{id}",
    request_body = EnrollmentFormUpdate,
    tag = "enrollment",
    summary = "Update an enrollment form",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 200, description = "Updated form", body = EnrollmentFormResponse),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Form not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    _: RequiresPermission<resource::Enrollment, operation::UpdateAll>,
    Json(request): Json<EnrollmentFormUpdate>,
) -> Result<Json<EnrollmentFormResponse>> {
    validate_form_status(request.status.as_deref())?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    form_by_id(&mut conn, id).await?;
    let form = EnrollmentForms::new(&mut conn).update(id, &request.into()).await?;

    Ok(Json(form.into()))
}

#[utoipa::path(
    delete,
    path = "/enrollment/forms/{id}",
    tag = "enrollment",
    summary = "Delete an enrollment form",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 200, description = "Deleted, with its submissions", body = MessageResponse),
        (status = 404, description = "Form not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Enrollment, operation::DeleteAll>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let form = form_by_id(&mut tx, id).await?;
    EnrollmentForms::new(&mut tx).delete(id).await?;

    ActivityLogs::new(&mut tx)
        .create(&activity_entry(&current_user, format!("Deleted enrollment form '{}'", form.name)).with_target(
            "EnrollmentForm",
            id,
            &form.name,
        ))
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(MessageResponse::new("Enrollment form deleted")))
}

#[utoipa::path(
    post,
    path = "/enrollment/forms/{id}/copy",
    tag = "enrollment",
    summary = "Duplicate an enrollment form",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 201, description = "Draft copy", body = EnrollmentFormResponse),
        (status = 404, description = "Form not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn copy_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    _: RequiresPermission<resource::Enrollment, operation::CreateAll>,
) -> Result<(StatusCode, Json<EnrollmentFormResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let copy = EnrollmentForms::new(&mut conn)
        .copy(id)
        .await?
        .ok_or_else(|| Error::not_found("Enrollment form", id))?;

    Ok((StatusCode::CREATED, Json(copy.into())))
}

#[utoipa::path(
    get,
    path = "/enrollment/submissions",
    tag = "enrollment",
    summary = "List submissions",
    responses((status = 200, description = "Submissions, most recently sent first", body = Vec<SubmissionResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_submissions(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Enrollment, operation::ReadAll>,
) -> Result<Json<Vec<SubmissionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submissions = EnrollmentSubmissions::new(&mut conn).list().await?;
    Ok(Json(submissions.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/enrollment/submissions/{id}",
    tag = "enrollment",
    summary = "Delete a submission",
    params(("id" = i64, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Submission not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<SubmissionId>,
    _: RequiresPermission<resource::Enrollment, operation::DeleteAll>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !EnrollmentSubmissions::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Submission", id));
    }
    Ok(Json(MessageResponse::new("Submission deleted")))
}

#[utoipa::path(
    post,
    path = "/enrollment/submissions/{id}/resend",
    tag = "enrollment",
    summary = "Resend the invitation email",
    params(("id" = i64, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Email sent", body = MessageResponse),
        (status = 400, description = "The lead has no parent email"),
        (status = 404, description = "Submission not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn resend_submission(
    State(state): State<AppState>,
    Path(id): Path<SubmissionId>,
    _: RequiresPermission<resource::Enrollment, operation::UpdateAll>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submission = EnrollmentSubmissions::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Submission", id))?;
    let lead = Leads::new(&mut conn)
        .get_by_id(submission.lead_id)
        .await?
        .ok_or_else(|| Error::not_found("Lead", submission.lead_id))?;
    drop(conn);

    let parent = lead
        .parents
        .first()
        .filter(|p| !p.email.trim().is_empty())
        .ok_or_else(|| Error::bad_request("This lead has no parent email on file"))?;

    state
        .email
        .send_enrollment_invitation(
            &parent.email,
            Some(&parent.first_name),
            submission.lead_student_first_name.as_deref().unwrap_or("your child"),
            &state.config.frontend_link(&enrollment_path(&submission.secure_token)),
        )
        .await?;

    Ok(Json(MessageResponse::new("Enrollment email resent")))
}

#[utoipa::path(
    get,
    path = "/enrollment/potential-recipients",
    tag = "enrollment",
    summary = "Leads a form can be sent to",
    params(RecipientsQuery),
    responses(
        (status = 200, description = "Candidate leads", body = Vec<RecipientResponse>),
        (status = 400, description = "Unknown recipient type"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn potential_recipients(
    State(state): State<AppState>,
    Query(query): Query<RecipientsQuery>,
    _: RequiresPermission<resource::Enrollment, operation::ReadAll>,
) -> Result<Json<Vec<RecipientResponse>>> {
    match query.recipient_type.as_deref().unwrap_or(NEW_STUDENTS_RECIPIENTS) {
        NEW_STUDENTS_RECIPIENTS => {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let leads = Leads::new(&mut conn).list_by_status(&RECIPIENT_LEAD_STATUSES).await?;
            Ok(Json(leads.into_iter().map(Into::into).collect()))
        }
        RETURNING_STUDENTS_RECIPIENTS => Ok(Json(Vec::new())),
        other => Err(Error::bad_request(format!("Unknown recipient type '{other}'"))),
    }
}

/// Send a form to each lead that hasn't already been sent it
#[utoipa::path(
    post,
    path = "/enrollment/forms/{id}/send",
    request_body = SendFormRequest,
    tag = "enrollment",
    summary = "Send a form to leads",
    params(("id" = i64, Path, description = "Form id")),
    responses(
        (status = 200, description = "Sent", body = MessageResponse),
        (status = 400, description = "No leads selected"),
        (status = 404, description = "Form not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Enrollment, operation::UpdateAll>,
    Json(request): Json<SendFormRequest>,
) -> Result<Json<MessageResponse>> {
    if request.lead_ids.is_empty() {
        return Err(Error::bad_request("Select at least one lead"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let form = form_by_id(&mut tx, id).await?;

    let mut invitations = Vec::new();
    let mut sent = 0;
    for lead_id in &request.lead_ids {
        let Some(lead) = Leads::new(&mut tx).get_by_id(*lead_id).await? else {
            tracing::debug!(lead_id, "Skipping unknown lead");
            continue;
        };
        let Some(submission) = EnrollmentSubmissions::new(&mut tx).create_if_absent(form.id, lead.id).await? else {
            continue;
        };
        sent += 1;

        if let Some(parent) = lead.parents.first().filter(|p| !p.email.trim().is_empty()) {
            invitations.push(Invitation {
                to_email: parent.email.clone(),
                to_name: parent.first_name.clone(),
                student_first_name: submission.lead_student_first_name.clone().unwrap_or_else(|| UNNAMED_STUDENT.to_string()),
                token: submission.secure_token,
            });
        }
    }

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Sent enrollment form '{}' to {sent} lead(s)", form.name)).with_target(
                "EnrollmentForm",
                form.id,
                &form.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if !invitations.is_empty() {
        let state = state.clone();
        tokio::spawn(async move {
            for invitation in invitations {
                let link = state.config.frontend_link(&enrollment_path(&invitation.token));
                if let Err(e) = state
                    .email
                    .send_enrollment_invitation(
                        &invitation.to_email,
                        Some(&invitation.to_name),
                        &invitation.student_first_name,
                        &link,
                    )
                    .await
                {
                    tracing::warn!(to = %invitation.to_email, "Failed to send enrollment invitation: {}", e);
                }
            }
        });
    }

    Ok(Json(MessageResponse::new(format!("Enrollment form sent to {sent} lead(s)."))))
}

async fn open_submission(conn: &mut PgConnection, token: &str) -> Result<SubmissionDBResponse> {
    let submission = EnrollmentSubmissions::new(conn)
        .get_by_token(token)
        .await?
        .ok_or_else(|| Error::not_found("Enrollment submission", token))?;
    if submission.is_closed() {
        return Err(Error::forbidden("This enrollment form has already been submitted."));
    }
    Ok(submission)
}

/// The form a family is asked to fill in (public, addressed by token)
#[utoipa::path(
    get,
    path = "/enrollment/public/submission/{token}",
    tag = "enrollment",
    summary = "Open an enrollment form",
    params(("token" = String, Path, description = "Submission secure token")),
    responses(
        (status = 200, description = "Form to fill in", body = PublicSubmissionResponse),
        (status = 403, description = "Form inactive or already submitted"),
        (status = 404, description = "Unknown token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn public_submission(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicSubmissionResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let submission = open_submission(&mut tx, &token).await?;
    let form = form_by_id(&mut tx, submission.form_id).await?;
    if form.status != ACTIVE_FORM_STATUS {
        return Err(Error::forbidden("This enrollment form is not currently active."));
    }
    EnrollmentSubmissions::new(&mut tx).mark_opened(submission.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PublicSubmissionResponse {
        submission_id: submission.id,
        form_structure: form.form_structure_json,
        fee_required: form.collect_fee,
        fee_amount: form.fee_amount,
        student_name: submission.lead_student_name.unwrap_or_else(|| UNNAMED_STUDENT.to_string()),
    }))
}

/// Submit a family's responses (public, addressed by token)
#[utoipa::path(
    post,
    path = "/enrollment/public/submission/{token}",
    request_body = PublicSubmit,
    tag = "enrollment",
    summary = "Submit an enrollment form",
    params(("token" = String, Path, description = "Submission secure token")),
    responses(
        (status = 200, description = "Submitted", body = MessageResponse),
        (status = 403, description = "Already submitted"),
        (status = 404, description = "Unknown token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn public_submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<PublicSubmit>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let submission = open_submission(&mut tx, &token).await?;
    let form = form_by_id(&mut tx, submission.form_id).await?;
    let paid = form.collect_fee;

    if !EnrollmentSubmissions::new(&mut tx).submit(submission.id, &request.responses, paid).await? {
        return Err(Error::forbidden("This enrollment form has already been submitted."));
    }

    let lead = Leads::new(&mut tx)
        .get_by_id(submission.lead_id)
        .await?
        .ok_or_else(|| Error::not_found("Lead", submission.lead_id))?;
    match Students::new(&mut tx).convert_lead(&lead).await? {
        Ok(converted) => tracing::info!(lead_id = lead.id, student_id = converted.student_id, "Lead enrolled from form"),
        Err(ConversionError::AlreadyConverted) => tracing::debug!(lead_id = lead.id, "Lead already converted"),
        Err(e) => tracing::warn!(lead_id = lead.id, reason = ?e, "Lead could not be converted"),
    }

    let student_name = submission.lead_student_name.unwrap_or_else(|| UNNAMED_STUDENT.to_string());
    let mut message = format!("An enrollment form for {student_name} has been submitted.");
    if paid {
        message.push_str(" Payment has been confirmed.");
    }
    let emails = notify_department(
        &mut tx,
        ACCOUNTING_DEPARTMENT,
        &message,
        &NotificationTarget::Lead {
            id: lead.id,
            secure_token: lead.secure_token.clone(),
        },
    )
    .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &ActivityLogCreateDBRequest::system(format!("Parent submitted enrollment for {student_name}")).with_target(
                "EnrollmentSubmission",
                submission.id,
                &student_name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    emails.dispatch(&state);

    Ok(Json(MessageResponse::new("Enrollment submitted successfully.")))
}

#[cfg(test)]
mod tests {
    use super::validate_form_status;
    use crate::{
        api::models::enrollment::{EnrollmentFormResponse, PublicSubmissionResponse, RecipientResponse, SubmissionResponse},
        db::{
            handlers::{ActivityLogs, EnrollmentSubmissions, Leads, Notifications, Students},
            models::enrollment::SubmissionDBResponse,
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn test_form_status_validation() {
        assert!(validate_form_status(None).is_ok());
        assert!(validate_form_status(Some("Active")).is_ok());
        assert!(validate_form_status(Some("Draft")).is_ok());
        assert!(validate_form_status(Some("Archived")).is_err());
    }

    async fn submissions(pool: &PgPool) -> Vec<SubmissionDBResponse> {
        let mut conn = pool.acquire().await.unwrap();
        EnrollmentSubmissions::new(&mut conn).list().await.unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_form_crud_and_copy(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Ena Registrar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        let response = app
            .post("/api/enrollment/forms")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"name": "Fall 2025"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let form: EnrollmentFormResponse = response.json();
        assert_eq!(form.status, "Draft");
        assert_eq!(form.recipient_type, "New Students");
        assert_eq!(form.form_structure_json["sections"].as_array().unwrap().len(), 4);

        app.put(&format!("/api/enrollment/forms/{}", form.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"status": "Archived"}))
            .await
            .assert_status_bad_request();
        let updated: EnrollmentFormResponse = app
            .put(&format!("/api/enrollment/forms/{}", form.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"status": "Active", "collect_fee": true, "fee_amount": "150.00"}))
            .await
            .json();
        assert_eq!(updated.status, "Active");
        assert!(updated.collect_fee);

        let response = app
            .post(&format!("/api/enrollment/forms/{}/copy", form.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .await;
        response.assert_status(StatusCode::CREATED);
        let copy: EnrollmentFormResponse = response.json();
        assert_eq!(copy.name, "Fall 2025 (Copy)");
        assert_eq!(copy.status, "Draft");
        assert!(copy.collect_fee);

        let forms: Vec<EnrollmentFormResponse> = app
            .get("/api/enrollment/forms")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(forms.len(), 2);

        app.delete(&format!("/api/enrollment/forms/{}", copy.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .assert_status_ok();
        app.get(&format!("/api/enrollment/forms/{}", copy.id))
            .add_header(auth.0, auth.1)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_potential_recipients(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Ena Registrar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));
        let toured = create_test_lead(&pool, "Ada").await;
        let lost = create_test_lead(&pool, "Ben").await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Leads::new(&mut conn).set_status(toured.id, "Toured").await.unwrap();
            Leads::new(&mut conn).set_status(lost.id, "Lost").await.unwrap();
        }

        let recipients: Vec<RecipientResponse> = app
            .get("/api/enrollment/potential-recipients?type=New%20Students")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].name, "Ada Student");

        let returning: Vec<RecipientResponse> = app
            .get("/api/enrollment/potential-recipients?type=Returning%20Students")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert!(returning.is_empty());

        app.get("/api/enrollment/potential-recipients?type=Alumni")
            .add_header(auth.0, auth.1)
            .await
            .assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_send_and_public_submission_flow(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let accounting = create_test_department(&pool, "Accounting Department", Some("/admin/accounting")).await;
        let bursar = create_test_staff(&pool, "Bea Bursar", &[accounting.id]).await;
        let registrar = create_test_staff(&pool, "Ena Registrar", &[]).await;
        let auth = add_auth_headers(&staff_user(registrar.id, &registrar.name, &[]));
        let lead = create_test_lead(&pool, "Ada").await;

        let form: EnrollmentFormResponse = app
            .post("/api/enrollment/forms")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"name": "Fall 2025", "collect_fee": true, "fee_amount": "150.00"}))
            .await
            .json();
        let send_url = format!("/api/enrollment/forms/{}/send", form.id);

        app.post(&send_url)
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"lead_ids": []}))
            .await
            .assert_status_bad_request();
        app.post(&send_url)
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"lead_ids": [lead.id]}))
            .await
            .assert_status_ok();
        // Resending to the same lead doesn't duplicate the submission
        app.post(&send_url)
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"lead_ids": [lead.id]}))
            .await
            .assert_status_ok();

        let sent = submissions(&pool).await;
        assert_eq!(sent.len(), 1);
        let public_url = format!("/api/enrollment/public/submission/{}", sent[0].secure_token);

        // Draft forms can't be opened
        app.get(&public_url).await.assert_status_forbidden();
        app.put(&format!("/api/enrollment/forms/{}", form.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"status": "Active"}))
            .await
            .assert_status_ok();

        let opened: PublicSubmissionResponse = app.get(&public_url).await.json();
        assert_eq!(opened.student_name, "Ada Student");
        assert!(opened.fee_required);
        assert_eq!(submissions(&pool).await[0].status, "Opened");

        app.post(&public_url)
            .json(&json!({"responses": {"allergies": "none"}}))
            .await
            .assert_status_ok();

        let listed: Vec<SubmissionResponse> = app
            .get("/api/enrollment/submissions")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(listed[0].status, "Completed");
        assert_eq!(listed[0].payment_status, "Paid");
        assert_eq!(listed[0].form_name, "Fall 2025");

        let mut conn = pool.acquire().await.unwrap();
        assert!(Students::new(&mut conn).exists_for_lead(lead.id).await.unwrap());
        let notes = Notifications::new(&mut conn).list_unread(bursar.id).await.unwrap();
        assert_eq!(
            notes[0].message,
            "An enrollment form for Ada Student has been submitted. Payment has been confirmed."
        );
        let logs = ActivityLogs::new(&mut conn).list(0, 1).await.unwrap();
        assert_eq!(logs[0].action, "Parent submitted enrollment for Ada Student");

        app.get(&public_url).await.assert_status_forbidden();
        app.post(&public_url)
            .json(&json!({"responses": {}}))
            .await
            .assert_status_forbidden();
        app.get("/api/enrollment/public/submission/not-a-token")
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resend_and_delete_submission(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Ena Registrar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));
        let lead = create_test_lead(&pool, "Ada").await;

        let form: EnrollmentFormResponse = app
            .post("/api/enrollment/forms")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({}))
            .await
            .json();
        assert_eq!(form.name, "Untitled Enrollment Form");
        app.post(&format!("/api/enrollment/forms/{}/send", form.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"lead_ids": [lead.id]}))
            .await
            .assert_status_ok();
        let id = submissions(&pool).await[0].id;

        app.post(&format!("/api/enrollment/submissions/{id}/resend"))
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .assert_status_ok();

        sqlx::query("UPDATE lead_parents SET email = '' WHERE lead_id = $1")
            .bind(lead.id)
            .execute(&pool)
            .await
            .unwrap();
        app.post(&format!("/api/enrollment/submissions/{id}/resend"))
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .assert_status_bad_request();

        app.delete(&format!("/api/enrollment/submissions/{id}"))
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .assert_status_ok();
        app.post(&format!("/api/enrollment/submissions/{id}/resend"))
            .add_header(auth.0, auth.1)
            .await
            .assert_status_not_found();
    }
}
