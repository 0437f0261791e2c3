//! Subsidy programs.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::{
        auth::required,
        subsidies::{SubsidyCreate, SubsidyResponse},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{handlers::Subsidies, models::subsidies::SubsidyCreateDBRequest},
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/subsidies",
    tag = "subsidies",
    summary = "List subsidy programs",
    responses((status = 200, description = "Subsidies by name", body = Vec<SubsidyResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_subsidies(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Subsidies, operation::ReadAll>,
) -> Result<Json<Vec<SubsidyResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let subsidies = Subsidies::new(&mut conn).list().await?;
    Ok(Json(subsidies.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/subsidies",
    request_body = SubsidyCreate,
    tag = "subsidies",
    summary = "Create a subsidy program",
    responses(
        (status = 201, description = "Created", body = SubsidyResponse),
        (status = 400, description = "Name missing"),
        (status = 409, description = "Name already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_subsidy(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Subsidies, operation::CreateAll>,
    Json(request): Json<SubsidyCreate>,
) -> Result<(StatusCode, Json<SubsidyResponse>)> {
    let name = required(&request.name).ok_or_else(|| Error::bad_request("Subsidy name is required"))?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let subsidy = Subsidies::new(&mut conn)
        .create(&SubsidyCreateDBRequest { name: name.to_string() })
        .await?;

    Ok((StatusCode::CREATED, Json(subsidy.into())))
}

#[cfg(test)]
mod tests {
    use crate::{api::models::subsidies::SubsidyResponse, test_utils::*};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_list_subsidies(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Bea Bursar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        for name in ["State Pre-K", "County Childcare"] {
            app.post("/api/subsidies")
                .add_header(auth.0.clone(), auth.1.clone())
                .json(&json!({"name": name}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        app.post("/api/subsidies")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"name": "State Pre-K"}))
            .await
            .assert_status(StatusCode::CONFLICT);
        app.post("/api/subsidies")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"name": "  "}))
            .await
            .assert_status_bad_request();

        let subsidies: Vec<SubsidyResponse> = app.get("/api/subsidies").add_header(auth.0, auth.1).await.json();
        let names: Vec<_> = subsidies.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["County Childcare", "State Pre-K"]);
        assert!(subsidies.iter().all(|s| s.is_active));
    }
}
