//! Audit trail of mutating actions.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::{
        activity::ActivityLogResponse,
        pagination::{PaginatedResponse, Pagination},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::handlers::ActivityLogs,
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/activity/logs",
    tag = "activity",
    summary = "List activity log entries",
    params(Pagination),
    responses((status = 200, description = "Newest entries first", body = PaginatedResponse<ActivityLogResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_activity_logs(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::ActivityLogs, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ActivityLogResponse>>> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ActivityLogs::new(&mut conn);
    let entries = repo.list(skip, limit).await?;
    let total_count = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        entries.into_iter().map(Into::into).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{handlers::ActivityLogs, models::activity::ActivityLogCreateDBRequest},
        test_utils::*,
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_activity_log_pagination(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        let mut conn = pool.acquire().await.unwrap();
        for i in 0..15 {
            ActivityLogs::new(&mut conn)
                .create(&ActivityLogCreateDBRequest::system(format!("Action {i}")))
                .await
                .unwrap();
        }

        let page: serde_json::Value = app
            .get("/api/activity/logs")
            .add_header(auth_name.clone(), auth_value.clone())
            .await
            .json();
        assert_eq!(page["total_count"], 15);
        assert_eq!(page["limit"], 10);
        assert_eq!(page["data"].as_array().unwrap().len(), 10);
        assert_eq!(page["data"][0]["action"], "Action 14");
        assert_eq!(page["data"][0]["actor_type"], "System");

        let page: serde_json::Value = app
            .get("/api/activity/logs?skip=10&limit=500")
            .add_header(auth_name, auth_value)
            .await
            .json();
        assert_eq!(page["limit"], 100);
        assert_eq!(page["data"].as_array().unwrap().len(), 5);

        app.get("/api/activity/logs").await.assert_status_unauthorized();
    }
}
