use crate::{
    AppState,
    api::models::auth::CurrentUser,
    auth::session,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract the principal from an `Authorization: Bearer <jwt>` header
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Bearer token present but invalid, expired or malformed
#[instrument(skip(parts, config))]
fn try_bearer_session_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?.trim();
    Some(session::verify_session_token(token, config))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_bearer_session_auth(parts, &state.config) {
            Some(Ok(user)) => {
                debug!(principal_id = user.id, role = ?user.role, "Authenticated session");
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Bearer session authentication failed: {:?}", e);
                Err(match e {
                    Error::Internal { .. } => e,
                    _ => Error::Unauthenticated {
                        message: Some("Invalid or expired token".to_string()),
                    },
                })
            }
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::auth::CurrentUser,
        auth::session,
        test_utils::{create_test_app_state, staff_user},
    };
    use axum::{Json, Router, routing::get};
    use axum_test::TestServer;
    use sqlx::PgPool;

    async fn whoami(user: CurrentUser) -> Json<CurrentUser> {
        Json(user)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bearer_token_round_trip(pool: PgPool) {
        let state = create_test_app_state(pool);
        let user = staff_user(7, "Dana Desk", &["Admission Department"]);
        let token = session::create_session_token(&user, &state.config).unwrap();

        let app = Router::new().route("/whoami", get(whoami)).with_state(state);
        let server = TestServer::new(app).unwrap();

        let response = server
            .get("/whoami")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status_ok();
        let body: CurrentUser = response.json();
        assert_eq!(body, user);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_and_invalid_tokens_are_unauthorized(pool: PgPool) {
        let state = create_test_app_state(pool);
        let app = Router::new().route("/whoami", get(whoami)).with_state(state);
        let server = TestServer::new(app).unwrap();

        server.get("/whoami").await.assert_status_unauthorized();

        server
            .get("/whoami")
            .add_header("authorization", "Bearer not-a-jwt")
            .await
            .assert_status_unauthorized();

        // Basic auth is not a session
        server
            .get("/whoami")
            .add_header("authorization", "Basic dXNlcjpwYXNz")
            .await
            .assert_status_unauthorized();
    }
}
