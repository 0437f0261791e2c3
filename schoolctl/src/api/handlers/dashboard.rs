//! Dashboard counters and the caller's own profile.

use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::{
        handlers::activity_entry,
        models::{
            auth::{CurrentUser, MessageResponse, required},
            dashboard::{AccountingOverview, AdministrationOverview, DashboardOverview, PasswordChange, ProfileResponse},
        },
    },
    auth::{
        password::{self, Argon2Params},
        permissions::{RequiresPermission, operation, resource},
    },
    db::{
        handlers::{ActivityLogs, Billing, Departments, Leads, Repository, Staff, Students, SuperAdmins},
        models::staff::StaffUpdateDBRequest,
    },
    errors::{Error, Result},
    types::Role,
};

const RECENT_ITEMS: i64 = 5;

#[utoipa::path(
    get,
    path = "/dashboard/overview",
    tag = "dashboards",
    summary = "School overview",
    responses((status = 200, description = "Headline counts and recent activity", body = DashboardOverview)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn overview(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Dashboards, operation::ReadAll>,
) -> Result<Json<DashboardOverview>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let total_staff = Staff::new(&mut conn).count(false).await?;
    let total_students = Students::new(&mut conn).count().await?;
    let total_departments = Departments::new(&mut conn).count().await?;
    let mut leads = Leads::new(&mut conn);
    let total_leads = leads.count().await?;
    let recent_leads = leads.recent(RECENT_ITEMS).await?;
    let recent_activities = ActivityLogs::new(&mut conn).list(0, RECENT_ITEMS).await?;

    Ok(Json(DashboardOverview {
        total_staff,
        total_students,
        total_departments,
        total_leads,
        recent_leads: recent_leads.into_iter().map(Into::into).collect(),
        recent_activities: recent_activities.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/accounting/overview",
    tag = "dashboards",
    summary = "Accounting overview",
    responses((status = 200, description = "Revenue and invoice counters", body = AccountingOverview)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn accounting_overview(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Dashboards, operation::ReadAll>,
) -> Result<Json<AccountingOverview>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut billing = Billing::new(&mut conn);

    Ok(Json(AccountingOverview {
        total_revenue: billing.total_revenue().await?,
        pending_invoices: billing.count_invoices_with_status("Sent").await?,
        overdue_payments: billing.count_overdue(Utc::now().date_naive()).await?,
        total_expenses: Decimal::ZERO,
    }))
}

#[utoipa::path(
    get,
    path = "/administration/overview",
    tag = "dashboards",
    summary = "Administration overview",
    responses((status = 200, description = "Administration counters", body = AdministrationOverview)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn administration_overview(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Dashboards, operation::ReadAll>,
) -> Result<Json<AdministrationOverview>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let total_staff_onboarded = Staff::new(&mut conn).count(true).await?;

    Ok(Json(AdministrationOverview {
        total_staff_onboarded,
        upcoming_events: 0,
        facility_requests: 0,
        open_support_tickets: 0,
    }))
}

#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    summary = "My profile",
    responses((status = 200, description = "The caller's profile", body = ProfileResponse)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn profile(current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    Ok(Json(ProfileResponse {
        name: current_user.name.clone(),
        email: current_user.email.clone(),
        role: current_user.role.label().to_string(),
        departments: current_user.department_names,
    }))
}

#[utoipa::path(
    put,
    path = "/profile/change-password",
    request_body = PasswordChange,
    tag = "profile",
    summary = "Change my password",
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Current password is wrong"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PasswordChange>,
) -> Result<Json<MessageResponse>> {
    let (Some(current), Some(new)) = (required(&request.current_password), required(&request.new_password)) else {
        return Err(Error::bad_request("Current and new passwords are required"));
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let stored_hash = match current_user.role {
        Role::SuperAdmin => SuperAdmins::new(&mut tx).get_by_id(current_user.id).await?.map(|a| a.password_hash),
        Role::Staff => Staff::new(&mut tx).get_by_id(current_user.id).await?.map(|s| s.password_hash),
    }
    .ok_or_else(|| Error::Unauthenticated { message: None })?;

    if !password::verify_off_runtime(current.to_string(), stored_hash).await? {
        return Err(Error::Unauthenticated {
            message: Some("Incorrect current password".to_string()),
        });
    }

    let new_hash = password::hash_off_runtime(new.to_string(), Argon2Params::from(&state.config.auth.password)).await?;
    match current_user.role {
        Role::SuperAdmin => {
            SuperAdmins::new(&mut tx).update_password(current_user.id, &new_hash).await?;
        }
        Role::Staff => {
            Staff::new(&mut tx)
                .update(
                    current_user.id,
                    &StaffUpdateDBRequest {
                        password_hash: Some(new_hash),
                        ..Default::default()
                    },
                )
                .await?;
        }
    }

    ActivityLogs::new(&mut tx)
        .create(&activity_entry(&current_user, "Changed their password"))
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(user_id = current_user.id, role = ?current_user.role, "Password changed");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::dashboard::{AccountingOverview, AdministrationOverview, ProfileResponse},
        db::handlers::ActivityLogs,
        test_utils::*,
    };
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_overview_counts(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let dept = create_test_department(&pool, "Library", None).await;
        let staff = create_test_staff(&pool, "Lee", &[dept.id]).await;
        for name in ["Ada", "Ben", "Cy", "Dee", "Eve", "Fay"] {
            create_test_lead(&pool, name).await;
        }
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &["Library"]));

        let overview: serde_json::Value = app
            .get("/api/dashboard/overview")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(overview["total_staff"], 1);
        assert_eq!(overview["total_students"], 0);
        assert_eq!(overview["total_departments"], 1);
        assert_eq!(overview["total_leads"], 6);
        assert_eq!(overview["recent_leads"].as_array().unwrap().len(), 5);
        assert_eq!(overview["recent_leads"][0]["students"][0]["first_name"], "Fay");

        let accounting: AccountingOverview = app
            .get("/api/accounting/overview")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(accounting.total_revenue, Decimal::ZERO);
        assert_eq!(accounting.pending_invoices, 0);
        assert_eq!(accounting.total_expenses, Decimal::ZERO);

        let admin: AdministrationOverview = app
            .get("/api/administration/overview")
            .add_header(auth.0, auth.1)
            .await
            .json();
        assert_eq!(admin.total_staff_onboarded, 1);
        assert_eq!(admin.open_support_tickets, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_roles(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let dept = create_test_department(&pool, "Library", None).await;
        let staff = create_test_staff(&pool, "Lee", &[dept.id]).await;

        let auth = add_auth_headers(&superadmin_user(admin.id, &admin.name));
        let profile: ProfileResponse = app.get("/api/profile").add_header(auth.0, auth.1).await.json();
        assert_eq!(profile.role, "Super Admin");
        assert!(profile.departments.is_empty());

        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &["Library"]));
        let profile: ProfileResponse = app.get("/api/profile").add_header(auth.0, auth.1).await.json();
        assert_eq!(profile.role, "Staff");
        assert_eq!(profile.departments, vec!["Library".to_string()]);

        app.get("/api/profile").await.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_change_password(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Lee", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        app.put("/api/profile/change-password")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"current_password": TEST_PASSWORD}))
            .await
            .assert_status_bad_request();

        app.put("/api/profile/change-password")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"current_password": "wrong", "new_password": "new-secret-pass"}))
            .await
            .assert_status_unauthorized();

        app.put("/api/profile/change-password")
            .add_header(auth.0, auth.1)
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "new-secret-pass"}))
            .await
            .assert_status_ok();

        app.post("/api/auth/login")
            .json(&json!({"email": staff.email, "password": TEST_PASSWORD}))
            .await
            .assert_status_unauthorized();
        app.post("/api/auth/login")
            .json(&json!({"email": staff.email, "password": "new-secret-pass"}))
            .await
            .assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let logs = ActivityLogs::new(&mut conn).list(0, 1).await.unwrap();
        assert_eq!(logs[0].action, "Changed their password");
        assert_eq!(logs[0].actor_name, "Lee");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_superadmin_change_password(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let auth = add_auth_headers(&superadmin_user(admin.id, &admin.name));

        app.put("/api/profile/change-password")
            .add_header(auth.0, auth.1)
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "head-secret-2"}))
            .await
            .assert_status_ok();

        app.post("/api/superadmin/login")
            .json(&json!({"email": TEST_SUPER_ADMIN_EMAIL, "password": "head-secret-2"}))
            .await
            .assert_status_ok();
    }
}
