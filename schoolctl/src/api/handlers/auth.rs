//! Staff login.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::auth::{CurrentUser, LoginRequest, TokenResponse, required},
    auth::{password, session},
    db::handlers::Staff,
    errors::{Error, Result},
};

pub(crate) fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Incorrect email or password".to_string()),
    }
}

/// Exchange staff credentials for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    summary = "Staff login",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials or inactive account"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<TokenResponse>> {
    let (Some(email), Some(password)) = (required(&request.email), required(&request.password)) else {
        return Err(Error::bad_request("Email and password are required"));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let staff = Staff::new(&mut conn)
        .get_by_email(email)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(invalid_credentials)?;

    if !password::verify_off_runtime(password.to_string(), staff.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }

    let token = session::create_session_token(&CurrentUser::from(&staff), &state.config)?;
    tracing::info!(staff_id = staff.id, "Staff logged in");

    Ok(Json(TokenResponse { access_token: token }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::auth::TokenResponse,
        auth::session,
        db::{
            handlers::{Repository, Staff},
            models::staff::StaffUpdateDBRequest,
        },
        test_utils::*,
        types::Role,
    };
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_returns_staff_token(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let dept = create_test_department(&pool, "Library", Some("/admin/library")).await;
        let staff = create_test_staff(&pool, "Lee Librarian", &[dept.id]).await;

        let response = app
            .post("/api/auth/login")
            .json(&json!({"email": staff.email, "password": TEST_PASSWORD}))
            .await;
        response.assert_status_ok();

        let token: TokenResponse = response.json();
        let user = session::verify_session_token(&token.access_token, &create_test_config()).unwrap();
        assert_eq!(user.id, staff.id);
        assert_eq!(user.role, Role::Staff);
        assert_eq!(user.department_names, vec!["Library".to_string()]);
        assert_eq!(user.dashboard_routes, vec!["/admin/library".to_string()]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_rejects_bad_credentials(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;

        app.post("/api/auth/login")
            .json(&json!({"email": staff.email}))
            .await
            .assert_status_bad_request();

        app.post("/api/auth/login")
            .json(&json!({"email": staff.email, "password": "wrong"}))
            .await
            .assert_status_unauthorized();

        app.post("/api/auth/login")
            .json(&json!({"email": "nobody@school.test", "password": TEST_PASSWORD}))
            .await
            .assert_status_unauthorized();

        let mut conn = pool.acquire().await.unwrap();
        Staff::new(&mut conn)
            .update(
                staff.id,
                &StaffUpdateDBRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        app.post("/api/auth/login")
            .json(&json!({"email": staff.email, "password": TEST_PASSWORD}))
            .await
            .assert_status_unauthorized();
    }
}
