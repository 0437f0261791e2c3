//! Staff roster management. Writes are reserved for the super admin.

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
            auth::{CurrentUser, MessageResponse, required},
            staff::{StaffCreate, StaffResponse, StaffUpdate},
        },
    },
    auth::{
        password::{self, Argon2Params},
        permissions::{RequiresPermission, operation, resource},
    },
    db::{
        handlers::{ActivityLogs, Departments, Repository, Staff, staff::StaffFilter},
        models::staff::{StaffCreateDBRequest, StaffUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{DepartmentId, StaffId},
};
use sqlx::PgConnection;

/// Every id must name an existing department
async fn ensure_departments_exist(conn: &mut PgConnection, ids: &[DepartmentId]) -> Result<()> {
    let found = Departments::new(conn).get_bulk(ids.to_vec()).await?;
    match ids.iter().find(|id| !found.contains_key(id)) {
        Some(missing) => Err(Error::not_found("Department", missing)),
        None => Ok(()),
    }
}

#[utoipa::path(
    post,
    path = "/staff",
    request_body = StaffCreate,
    tag = "staff",
    summary = "Create a staff member",
    responses(
        (status = 201, description = "Staff member created", body = StaffResponse),
        (status = 400, description = "Missing fields or no departments"),
        (status = 403, description = "Requires Super Admin"),
        (status = 404, description = "Unknown department"),
        (status = 409, description = "Email already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_staff(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Staff, operation::CreateAll>,
    Json(request): Json<StaffCreate>,
) -> Result<(StatusCode, Json<StaffResponse>)> {
    let (Some(name), Some(email), Some(password)) = (
        required(&request.name),
        required(&request.email),
        required(&request.password),
    ) else {
        return Err(Error::bad_request("Name, email, password, and at least one department are required"));
    };
    if request.department_ids.is_empty() {
        return Err(Error::bad_request("Name, email, password, and at least one department are required"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Staff::new(&mut tx).get_by_email(email).await?.is_some() {
        return Err(Error::conflict("Email already in use"));
    }
    ensure_departments_exist(&mut tx, &request.department_ids).await?;

    let password_hash = password::hash_off_runtime(password.to_string(), Argon2Params::from(&state.config.auth.password)).await?;
    let staff = Staff::new(&mut tx)
        .create(&StaffCreateDBRequest {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            department_ids: request.department_ids.clone(),
        })
        .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Created new staff member: '{}'", staff.name)).with_target(
                "Staff",
                staff.id,
                &staff.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(staff.into())))
}

#[utoipa::path(
    get,
    path = "/staff",
    tag = "staff",
    summary = "List staff",
    responses((status = 200, description = "All staff members", body = Vec<StaffResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_staff(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Staff, operation::ReadAll>,
) -> Result<Json<Vec<StaffResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let staff = Staff::new(&mut conn).list(&StaffFilter::default()).await?;
    Ok(Json(staff.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    put,
    path = "/staff/{id}",
    request_body = StaffUpdate,
    tag = "staff",
    summary = "Update a staff member",
    params(("id" = i64, Path, description = "Staff id")),
    responses(
        (status = 200, description = "Updated staff member", body = StaffResponse),
        (status = 403, description = "Requires Super Admin"),
        (status = 404, description = "Staff member or department not found"),
        (status = 409, description = "Email already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<StaffId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Staff, operation::UpdateAll>,
    Json(request): Json<StaffUpdate>,
) -> Result<Json<StaffResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Staff::new(&mut tx).get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Staff member", id));
    }
    if let Some(department_ids) = &request.department_ids {
        ensure_departments_exist(&mut tx, department_ids).await?;
    }

    let password_hash = match required(&request.password) {
        Some(password) => {
            Some(password::hash_off_runtime(password.to_string(), Argon2Params::from(&state.config.auth.password)).await?)
        }
        None => None,
    };

    let staff = Staff::new(&mut tx)
        .update(
            id,
            &StaffUpdateDBRequest {
                name: required(&request.name).map(str::to_string),
                email: required(&request.email).map(str::to_string),
                is_active: request.is_active,
                department_ids: request.department_ids.clone(),
                password_hash,
            },
        )
        .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Updated staff member details for '{}'", staff.name)).with_target(
                "Staff",
                staff.id,
                &staff.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(staff.into()))
}

#[utoipa::path(
    delete,
    path = "/staff/{id}",
    tag = "staff",
    summary = "Delete a staff member",
    params(("id" = i64, Path, description = "Staff id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Requires Super Admin"),
        (status = 404, description = "Staff member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_staff(
    State(state): State<AppState>,
    Path(id): Path<StaffId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Staff, operation::DeleteAll>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let staff = Staff::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Staff member", id))?;
    Staff::new(&mut tx).delete(id).await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Deleted staff member: '{}'", staff.name)).with_target("Staff", id, &staff.name),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(MessageResponse::new("Staff member deleted successfully")))
}
