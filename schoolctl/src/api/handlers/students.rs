//! Enrolled students and lead conversion.

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
            students::{ConversionResponse, StudentResponse},
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::handlers::{ActivityLogs, Leads, Students},
    errors::{Error, Result},
    types::{LeadId, StudentId},
};

pub(crate) const ALREADY_CONVERTED: &str = "This lead has already been converted or is invalid.";

#[utoipa::path(
    post,
    path = "/students/from-lead/{lead_id}",
    tag = "students",
    summary = "Convert a lead into a student",
    params(("lead_id" = i64, Path, description = "Lead id")),
    responses(
        (status = 201, description = "Student created", body = ConversionResponse),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Already converted or missing student/parent"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn convert_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<LeadId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Students, operation::CreateAll>,
) -> Result<(StatusCode, Json<ConversionResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let lead = Leads::new(&mut tx)
        .get_by_id(lead_id)
        .await?
        .ok_or_else(|| Error::not_found("Lead", lead_id))?;

    let converted = match Students::new(&mut tx).convert_lead(&lead).await? {
        Ok(converted) => converted,
        Err(reason) => {
            tracing::debug!(lead_id, ?reason, "Lead conversion refused");
            return Err(Error::conflict(ALREADY_CONVERTED));
        }
    };

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Converted lead to student: '{}'", converted.student_name)).with_target(
                "Student",
                converted.student_id,
                &converted.student_name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(lead_id, student_id = converted.student_id, "Lead converted");

    Ok((
        StatusCode::CREATED,
        Json(ConversionResponse {
            message: "Lead successfully converted to student.".to_string(),
            student_id: converted.student_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    summary = "List active students",
    responses((status = 200, description = "Active students by last, first name", body = Vec<StudentResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_students(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Students, operation::ReadAll>,
) -> Result<Json<Vec<StudentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let students = Students::new(&mut conn).list_active().await?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    summary = "Get a student",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "The student with parents", body = StudentResponse),
        (status = 404, description = "Student not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    _: RequiresPermission<resource::Students, operation::ReadAll>,
) -> Result<Json<StudentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = Students::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Student", id))?;
    Ok(Json(student.into()))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            leads::LeadResponse,
            students::{ConversionResponse, StudentResponse},
        },
        db::handlers::{Billing, Leads},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use chrono::Utc;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_convert_lead_once(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));
        let lead = create_test_lead(&pool, "Max").await;

        let response = app
            .post(&format!("/api/students/from-lead/{}", lead.id))
            .add_header(auth_name.clone(), auth_value.clone())
            .await;
        response.assert_status(StatusCode::CREATED);
        let converted: ConversionResponse = response.json();

        let student: StudentResponse = app
            .get(&format!("/api/students/{}", converted.student_id))
            .add_header(auth_name.clone(), auth_value.clone())
            .await
            .json();
        assert_eq!(student.first_name, "Max");
        assert_eq!(student.status, "Active");
        assert_eq!(student.enrollment_date, Utc::now().date_naive());
        assert_eq!(student.lead_id, Some(lead.id));
        assert_eq!(student.parents.len(), 1);
        assert_eq!(student.parents[0].email, lead.parents[0].email);

        let mut conn = pool.acquire().await.unwrap();
        assert!(Billing::new(&mut conn).account_for_student(student.id).await.unwrap().is_some());
        let lead_now = Leads::new(&mut conn).get_by_id(lead.id).await.unwrap().unwrap();
        assert_eq!(LeadResponse::from(lead_now).status, "Enrolled");

        let response = app
            .post(&format!("/api/students/from-lead/{}", lead.id))
            .add_header(auth_name.clone(), auth_value.clone())
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            response.json::<serde_json::Value>()["message"],
            super::ALREADY_CONVERTED
        );

        app.post("/api/students/from-lead/999999")
            .add_header(auth_name, auth_value)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_students_sorted_by_name(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        for first in ["Zed", "Amy"] {
            let lead = create_test_lead(&pool, first).await;
            app.post(&format!("/api/students/from-lead/{}", lead.id))
                .add_header(auth_name.clone(), auth_value.clone())
                .await
                .assert_status(StatusCode::CREATED);
        }

        let students: Vec<StudentResponse> = app
            .get("/api/students")
            .add_header(auth_name, auth_value)
            .await
            .json();
        let names: Vec<_> = students.iter().map(|s| s.first_name.as_str()).collect();
        assert_eq!(names, ["Amy", "Zed"]);
    }
}
