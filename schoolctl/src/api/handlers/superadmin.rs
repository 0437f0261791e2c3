//! Super admin bootstrap: one-time registration confirmed by an emailed code, login and profile.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    AppState,
    api::{
        handlers::auth::invalid_credentials,
        models::auth::{
            CurrentUser, LoginRequest, MessageResponse, SuperAdminCheckResponse, SuperAdminProfile, SuperAdminRegisterRequest,
            SuperAdminVerifyRequest, TokenResponse, required,
        },
    },
    auth::{
        password::{self, Argon2Params},
        permissions::require_superadmin,
        session,
    },
    db::{
        handlers::{Departments, SuperAdmins},
        models::super_admins::{PendingRegistration, SuperAdminCreateDBRequest},
    },
    errors::{Error, Result},
};

fn already_exists() -> Error {
    Error::conflict("A Super Admin account already exists.")
}

/// Whether the super admin has been registered
#[utoipa::path(
    get,
    path = "/superadmin/check",
    tag = "superadmin",
    summary = "Check for a super admin",
    responses((status = 200, description = "Registration state", body = SuperAdminCheckResponse))
)]
#[tracing::instrument(skip_all)]
pub async fn check(State(state): State<AppState>) -> Result<Json<SuperAdminCheckResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let super_admin_exists = SuperAdmins::new(&mut conn).exists().await?;
    Ok(Json(SuperAdminCheckResponse { super_admin_exists }))
}

/// Start registration: store a pending request and email a verification code
#[utoipa::path(
    post,
    path = "/superadmin/register",
    request_body = SuperAdminRegisterRequest,
    tag = "superadmin",
    summary = "Request super admin registration",
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Email is not the configured super admin address"),
        (status = 409, description = "A super admin already exists"),
        (status = 500, description = "Super admin email not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<SuperAdminRegisterRequest>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if SuperAdmins::new(&mut conn).exists().await? {
        return Err(already_exists());
    }

    let allowed_email = state.config.super_admin_email.as_deref().ok_or_else(|| Error::Internal {
        operation: "register super admin: super_admin_email is not configured".to_string(),
    })?;

    let (Some(name), Some(email), Some(password)) = (
        required(&request.name),
        required(&request.email),
        required(&request.password),
    ) else {
        return Err(Error::bad_request("Name, email, and password are required"));
    };

    if !email.eq_ignore_ascii_case(allowed_email.trim()) {
        return Err(Error::forbidden("This email is not authorized for Super Admin registration."));
    }

    let params = Argon2Params::from(&state.config.auth.password);
    let otp = password::generate_otp();
    let password_hash = password::hash_off_runtime(password.to_string(), params).await?;
    let otp_hash = password::hash_off_runtime(otp.clone(), params).await?;

    SuperAdmins::new(&mut conn)
        .upsert_pending(&PendingRegistration {
            email: email.to_lowercase(),
            name: name.to_string(),
            password_hash,
            otp_hash,
            created_at: Utc::now(),
        })
        .await?;

    state.email.send_verification_code(email, Some(name), &otp).await?;
    tracing::info!("Super admin verification code sent");

    Ok(Json(MessageResponse::new(
        "A verification code has been sent to your email. Please check your inbox.",
    )))
}

/// Confirm registration with the emailed code; creates the account and the core departments
#[utoipa::path(
    post,
    path = "/superadmin/verify",
    request_body = SuperAdminVerifyRequest,
    tag = "superadmin",
    summary = "Verify super admin registration",
    responses(
        (status = 201, description = "Super admin created", body = MessageResponse),
        (status = 400, description = "Missing fields, no pending request, expired or wrong code"),
        (status = 409, description = "A super admin already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<SuperAdminVerifyRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if SuperAdmins::new(&mut tx).exists().await? {
        return Err(already_exists());
    }

    let (Some(email), Some(otp)) = (required(&request.email), required(&request.otp)) else {
        return Err(Error::bad_request("Email and OTP are required"));
    };
    let email = email.to_lowercase();

    let pending = SuperAdmins::new(&mut tx)
        .get_pending(&email)
        .await?
        .ok_or_else(|| Error::bad_request("No pending registration found for this email."))?;

    let ttl = chrono::Duration::from_std(state.config.auth.otp_ttl).map_err(|e| Error::Internal {
        operation: format!("convert otp ttl: {e}"),
    })?;
    if Utc::now() - pending.created_at > ttl {
        SuperAdmins::new(&mut tx).delete_pending(&email).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        return Err(Error::bad_request("Verification code has expired. Please register again."));
    }

    if !password::verify_off_runtime(otp.to_string(), pending.otp_hash.clone()).await? {
        return Err(Error::bad_request("Invalid verification code."));
    }

    let admin = SuperAdmins::new(&mut tx)
        .create(&SuperAdminCreateDBRequest {
            name: pending.name,
            email: pending.email,
            password_hash: pending.password_hash,
        })
        .await?;
    let seeded = Departments::new(&mut tx).seed_core_departments().await?;
    SuperAdmins::new(&mut tx).delete_pending(&email).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(super_admin_id = admin.id, seeded, "Super admin registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Super Admin account created successfully.")),
    ))
}

/// Exchange super admin credentials for a bearer token
#[utoipa::path(
    post,
    path = "/superadmin/login",
    request_body = LoginRequest,
    tag = "superadmin",
    summary = "Super admin login",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<TokenResponse>> {
    let (Some(email), Some(password)) = (required(&request.email), required(&request.password)) else {
        return Err(Error::bad_request("Email and password are required"));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let admin = SuperAdmins::new(&mut conn)
        .get_by_email(email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_off_runtime(password.to_string(), admin.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }

    let token = session::create_session_token(&CurrentUser::from(&admin), &state.config)?;
    Ok(Json(TokenResponse { access_token: token }))
}

#[utoipa::path(
    get,
    path = "/superadmin/profile",
    tag = "superadmin",
    summary = "Super admin profile",
    responses(
        (status = 200, description = "Profile", body = SuperAdminProfile),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the super admin"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SuperAdminProfile>> {
    require_superadmin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let admin = SuperAdmins::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("Super Admin", current_user.id))?;

    Ok(Json(admin.into()))
}
