//! Admissions: public applications and the admissions dashboard.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::activity_entry,
        models::{
            auth::CurrentUser,
            leads::{LeadCreate, LeadDetailsUpdate, LeadResponse, LeadUpdate},
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{ActivityLogs, Leads, departments::ADMISSION_DEPARTMENT},
        models::{
            activity::ActivityLogCreateDBRequest,
            leads::{LeadCreateDBRequest, LeadDBResponse, LeadParentUpdate, LeadStudentUpdate},
        },
    },
    errors::{Error, Result},
    notifications::{NotificationTarget, notify_department},
};
use sqlx::PgConnection;

async fn lead_by_token(conn: &mut PgConnection, token: &str) -> Result<LeadDBResponse> {
    Leads::new(conn)
        .get_by_token(token)
        .await?
        .ok_or_else(|| Error::not_found("Lead", token))
}

/// Submit an admission application (public)
#[utoipa::path(
    post,
    path = "/admissions/leads",
    request_body = LeadCreate,
    tag = "admissions",
    summary = "Submit an admission application",
    responses(
        (status = 201, description = "Application received", body = LeadResponse),
        (status = 400, description = "Needs named students, named parents with emails and policy agreement"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_lead(State(state): State<AppState>, Json(request): Json<LeadCreate>) -> Result<(StatusCode, Json<LeadResponse>)> {
    if let Some(message) = request.validation_error() {
        return Err(Error::bad_request(message));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let lead = Leads::new(&mut tx).create(&LeadCreateDBRequest::from(request)).await?;
    let student_name = lead.primary_student_name().unwrap_or_default();

    ActivityLogs::new(&mut tx)
        .create(
            &ActivityLogCreateDBRequest::system("Submitted a new admission application").with_target(
                "Lead",
                lead.id,
                &student_name,
            ),
        )
        .await?;

    let emails = notify_department(
        &mut tx,
        ADMISSION_DEPARTMENT,
        &format!("A new admission application has been submitted for {student_name}."),
        &NotificationTarget::Lead {
            id: lead.id,
            secure_token: lead.secure_token.clone(),
        },
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    emails.dispatch(&state);
    tracing::info!(lead_id = lead.id, "Admission application received");

    Ok((StatusCode::CREATED, Json(lead.into())))
}

#[utoipa::path(
    get,
    path = "/admissions/leads",
    tag = "admissions",
    summary = "List leads",
    responses((status = 200, description = "All leads, newest first", body = Vec<LeadResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_leads(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Leads, operation::ReadAll>,
) -> Result<Json<Vec<LeadResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let leads = Leads::new(&mut conn).list().await?;
    Ok(Json(leads.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/admissions/leads/{token}",
    tag = "admissions",
    summary = "Get a lead",
    params(("token" = String, Path, description = "Lead secure token")),
    responses(
        (status = 200, description = "The lead", body = LeadResponse),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_lead(
    State(state): State<AppState>,
    Path(token): Path<String>,
    _: RequiresPermission<resource::Leads, operation::ReadAll>,
) -> Result<Json<LeadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(lead_by_token(&mut conn, &token).await?.into()))
}

/// Edit the students and parents on an application; ids from other leads are ignored
#[utoipa::path(
    put,
    path = "/admissions/leads/{token}/details",
    request_body = LeadDetailsUpdate,
    tag = "admissions",
    summary = "Update lead students and parents",
    params(("token" = String, Path, description = "Lead secure token")),
    responses(
        (status = 200, description = "Updated lead", body = LeadResponse),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lead_details(
    State(state): State<AppState>,
    Path(token): Path<String>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Leads, operation::UpdateAll>,
    Json(request): Json<LeadDetailsUpdate>,
) -> Result<Json<LeadResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut tx, &token).await?;

    let mut ignored = 0usize;
    let mut repo = Leads::new(&mut tx);
    for student in request.students.unwrap_or_default() {
        if !repo.update_student(lead.id, &LeadStudentUpdate::from(student)).await? {
            ignored += 1;
        }
    }
    for parent in request.parents.unwrap_or_default() {
        if !repo.update_parent(lead.id, &LeadParentUpdate::from(parent)).await? {
            ignored += 1;
        }
    }
    repo.touch(lead.id).await?;
    if ignored > 0 {
        tracing::debug!(lead_id = lead.id, ignored, "Skipped rows that do not belong to this lead");
    }

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, "Updated lead details (student/parent info)").with_target(
                "Lead",
                lead.id,
                lead.primary_student_name().unwrap_or_default(),
            ),
        )
        .await?;

    let updated = lead_by_token(&mut tx, &token).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(updated.into()))
}

#[utoipa::path(
    put,
    path = "/admissions/leads/{token}",
    request_body = LeadUpdate,
    tag = "admissions",
    summary = "Update lead status and internal notes",
    params(("token" = String, Path, description = "Lead secure token")),
    responses(
        (status = 200, description = "Updated lead", body = LeadResponse),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lead(
    State(state): State<AppState>,
    Path(token): Path<String>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Leads, operation::UpdateAll>,
    Json(request): Json<LeadUpdate>,
) -> Result<Json<LeadResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let lead = lead_by_token(&mut tx, &token).await?;

    if let Some(action) = request.describe() {
        Leads::new(&mut tx)
            .update_status_and_notes(lead.id, request.status.as_deref(), request.internal_notes.as_deref())
            .await?;

        ActivityLogs::new(&mut tx)
            .create(&activity_entry(&current_user, action).with_target(
                "Lead",
                lead.id,
                lead.primary_student_name().unwrap_or_default(),
            ))
            .await?;
    }

    let updated = lead_by_token(&mut tx, &token).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::leads::LeadResponse,
        db::handlers::{ActivityLogs, Notifications, departments::ADMISSION_DEPARTMENT},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    fn application() -> serde_json::Value {
        json!({
            "students": [{"first_name": "Ada", "last_name": "Lovelace", "grade_level": "2"}],
            "parents": [{"first_name": "Anne", "last_name": "Lovelace", "email": "anne@family.test"}],
            "policy_agreed": true,
            "expected_start_date": "2026-09-01"
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_public_application_notifies_admissions(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admissions = create_test_department(&pool, ADMISSION_DEPARTMENT, Some("/admin/admissions")).await;
        let officer = create_test_staff(&pool, "Olive Officer", &[admissions.id]).await;
        let bystander = create_test_staff(&pool, "Barry", &[]).await;

        let response = app.post("/api/admissions/leads").json(&application()).await;
        response.assert_status(StatusCode::CREATED);
        let lead: LeadResponse = response.json();
        assert_eq!(lead.status, "Waitlisted");
        assert_eq!(lead.payment_status, "Unpaid");
        assert_eq!(lead.students.len(), 1);

        let mut conn = pool.acquire().await.unwrap();
        let notifications = Notifications::new(&mut conn).list_unread(officer.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].message,
            "A new admission application has been submitted for Ada Lovelace."
        );
        assert_eq!(
            notifications[0].target_link.as_deref(),
            Some(format!("/admin/admissions/leads/{}", lead.secure_token).as_str())
        );
        assert!(Notifications::new(&mut conn).list_unread(bystander.id).await.unwrap().is_empty());

        let log = ActivityLogs::new(&mut conn).list(0, 1).await.unwrap();
        assert_eq!(log[0].action, "Submitted a new admission application");
        assert_eq!(log[0].target_name.as_deref(), Some("Ada Lovelace"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_requires_policy_and_people(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;

        let mut no_policy = application();
        no_policy["policy_agreed"] = json!(false);
        app.post("/api/admissions/leads")
            .json(&no_policy)
            .await
            .assert_status_bad_request();

        let mut no_parents = application();
        no_parents["parents"] = json!([]);
        app.post("/api/admissions/leads")
            .json(&no_parents)
            .await
            .assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_rejects_blank_names_and_parent_email(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;

        let mut no_email = application();
        no_email["parents"] = json!([{"first_name": "P", "last_name": "Parent"}]);
        app.post("/api/admissions/leads")
            .json(&no_email)
            .await
            .assert_status_bad_request();

        let mut no_last_name = application();
        no_last_name["students"] = json!([{"first_name": "Kid"}]);
        app.post("/api/admissions/leads")
            .json(&no_last_name)
            .await
            .assert_status_bad_request();

        let mut blank_parent_name = application();
        blank_parent_name["parents"][0]["first_name"] = json!("   ");
        app.post("/api/admissions/leads")
            .json(&blank_parent_name)
            .await
            .assert_status_bad_request();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_status_notes_and_details(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));
        let lead = create_test_lead(&pool, "Max").await;
        let other = create_test_lead(&pool, "Other").await;

        let updated: LeadResponse = app
            .put(&format!("/api/admissions/leads/{}", lead.secure_token))
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"status": "Toured", "internal_notes": "Loved the library"}))
            .await
            .json();
        assert_eq!(updated.status, "Toured");
        assert_eq!(updated.internal_notes.as_deref(), Some("Loved the library"));

        // The second student id belongs to another lead and must be left alone
        let updated: LeadResponse = app
            .put(&format!("/api/admissions/leads/{}/details", lead.secure_token))
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"students": [
                {"id": lead.students[0].id, "grade_level": "1"},
                {"id": other.students[0].id, "first_name": "Hijacked"}
            ]}))
            .await
            .json();
        assert_eq!(updated.students[0].grade_level.as_deref(), Some("1"));

        let other_now: LeadResponse = app
            .get(&format!("/api/admissions/leads/{}", other.secure_token))
            .add_header(auth_name.clone(), auth_value.clone())
            .await
            .json();
        assert_eq!(other_now.students[0].first_name, "Other");

        let mut conn = pool.acquire().await.unwrap();
        let actions: Vec<_> = ActivityLogs::new(&mut conn)
            .list(0, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            [
                "Updated lead details (student/parent info)",
                "Updated lead status to 'Toured' and updated internal notes",
            ]
        );

        app.get("/api/admissions/leads/not-a-token")
            .add_header(auth_name, auth_value)
            .await
            .assert_status_not_found();
    }
}
