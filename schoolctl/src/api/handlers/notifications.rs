//! In-app notifications and browser push subscriptions.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::{
        auth::{CurrentUser, MessageResponse},
        notifications::{MarkAllReadResponse, NotificationResponse, VapidKeyResponse},
    },
    db::handlers::{Notifications, PushSubscriptions},
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    summary = "My unread notifications",
    responses((status = 200, description = "Unread notifications, newest first", body = Vec<NotificationResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<NotificationResponse>>> {
    let Some(staff_id) = current_user.staff_id() else {
        return Ok(Json(Vec::new()));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notifications = Notifications::new(&mut conn).list_unread(staff_id).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/notifications/mark-all-as-read",
    tag = "notifications",
    summary = "Mark all my notifications read",
    responses((status = 200, description = "Number of notifications marked read", body = MarkAllReadResponse)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_read(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<MarkAllReadResponse>> {
    let updated = match current_user.staff_id() {
        Some(staff_id) => {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            Notifications::new(&mut conn).mark_all_read(staff_id).await?
        }
        None => 0,
    };

    Ok(Json(MarkAllReadResponse {
        message: "All notifications marked as read.".to_string(),
        updated,
    }))
}

#[utoipa::path(
    get,
    path = "/push/vapid-key",
    tag = "push",
    summary = "Public key for browser push subscriptions",
    responses(
        (status = 200, description = "VAPID public key", body = VapidKeyResponse),
        (status = 500, description = "Push is not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn vapid_key(State(state): State<AppState>) -> Result<Json<VapidKeyResponse>> {
    let public_key = state.push.vapid_public_key().ok_or_else(|| Error::Internal {
        operation: "read VAPID public key: push.vapid_public_key is not configured".to_string(),
    })?;

    Ok(Json(VapidKeyResponse {
        public_key: public_key.to_string(),
    }))
}

/// Store the caller's browser subscription, replacing any earlier one
#[utoipa::path(
    post,
    path = "/push/subscribe",
    tag = "push",
    summary = "Register a push subscription",
    request_body(content = Object, description = "Browser PushSubscription JSON"),
    responses(
        (status = 201, description = "Subscription saved", body = MessageResponse),
        (status = 400, description = "Empty subscription"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(subscription): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let empty = match &subscription {
        serde_json::Value::Object(fields) => fields.is_empty(),
        serde_json::Value::Null => true,
        _ => false,
    };
    if empty {
        return Err(Error::bad_request("Subscription object is required"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    PushSubscriptions::new(&mut conn)
        .upsert(current_user.participant(), &subscription)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("Subscription saved."))))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::notifications::{MarkAllReadResponse, NotificationResponse, VapidKeyResponse},
        db::handlers::PushSubscriptions,
        notifications::{NotificationTarget, notify_staff},
        db::models::staff::StaffContact,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_mark_read(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        let contact = StaffContact {
            id: staff.id,
            name: staff.name.clone(),
            email: staff.email.clone(),
        };
        let mut conn = pool.acquire().await.unwrap();
        for id in [1, 2] {
            let _ = notify_staff(&mut conn, std::slice::from_ref(&contact), "ping", &NotificationTarget::Conversation { id })
                .await
                .unwrap();
        }

        let unread: Vec<NotificationResponse> = app
            .get("/api/notifications")
            .add_header(auth_name.clone(), auth_value.clone())
            .await
            .json();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].target_id, Some(2));

        let marked: MarkAllReadResponse = app
            .post("/api/notifications/mark-all-as-read")
            .add_header(auth_name.clone(), auth_value.clone())
            .await
            .json();
        assert_eq!(marked.updated, 2);

        let unread: Vec<NotificationResponse> = app
            .get("/api/notifications")
            .add_header(auth_name, auth_value)
            .await
            .json();
        assert!(unread.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_push_key_and_subscription(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let user = superadmin_user(admin.id, &admin.name);
        let (auth_name, auth_value) = add_auth_headers(&user);

        let key: VapidKeyResponse = app.get("/api/push/vapid-key").await.json();
        assert_eq!(key.public_key, "BTestVapidPublicKey");

        app.post("/api/push/subscribe")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({}))
            .await
            .assert_status_bad_request();

        app.post("/api/push/subscribe")
            .add_header(auth_name, auth_value)
            .json(&json!({"endpoint": "https://push.example/abc", "keys": {"p256dh": "x", "auth": "y"}}))
            .await
            .assert_status(StatusCode::CREATED);

        let mut conn = pool.acquire().await.unwrap();
        let stored = PushSubscriptions::new(&mut conn).get(user.participant()).await.unwrap().unwrap();
        assert_eq!(stored.subscription_json["endpoint"], "https://push.example/abc");
    }
}
