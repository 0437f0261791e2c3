//! Department management. Writes are reserved for the super admin.

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
            departments::{DepartmentCreate, DepartmentResponse, DepartmentUpdate},
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{
            ActivityLogs, Departments, Repository,
            departments::{DepartmentFilter, is_reserved_route},
        },
        models::departments::{DepartmentCreateDBRequest, DepartmentUpdateDBRequest},
    },
    errors::{Error, Result},
    types::DepartmentId,
};

#[utoipa::path(
    post,
    path = "/departments",
    request_body = DepartmentCreate,
    tag = "departments",
    summary = "Create a department",
    responses(
        (status = 201, description = "Department created", body = DepartmentResponse),
        (status = 400, description = "Name missing"),
        (status = 403, description = "Requires Super Admin"),
        (status = 409, description = "Reserved route or name in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_department(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Departments, operation::CreateAll>,
    Json(request): Json<DepartmentCreate>,
) -> Result<(StatusCode, Json<DepartmentResponse>)> {
    let name = required(&request.name).ok_or_else(|| Error::bad_request("Department name is required"))?;
    let dashboard_route = required(&request.dashboard_route);

    if let Some(route) = dashboard_route
        && is_reserved_route(route)
    {
        return Err(Error::conflict(format!("The dashboard route '{route}' is reserved")));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Departments::new(&mut tx).get_by_name(name).await?.is_some() {
        return Err(Error::conflict(format!("Department '{name}' already exists")));
    }

    let department = Departments::new(&mut tx)
        .create(&DepartmentCreateDBRequest {
            name: name.to_string(),
            description: required(&request.description).map(str::to_string),
            dashboard_route: dashboard_route.map(str::to_string),
        })
        .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Created new department: '{}'", department.name)).with_target(
                "Department",
                department.id,
                &department.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(department.into())))
}

#[utoipa::path(
    get,
    path = "/departments",
    tag = "departments",
    summary = "List departments",
    responses((status = 200, description = "Departments ordered by name", body = Vec<DepartmentResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_departments(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Departments, operation::ReadAll>,
) -> Result<Json<Vec<DepartmentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let departments = Departments::new(&mut conn).list(&DepartmentFilter::default()).await?;
    Ok(Json(departments.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    put,
    path = "/departments/{id}",
    request_body = DepartmentUpdate,
    tag = "departments",
    summary = "Update a department",
    params(("id" = i64, Path, description = "Department id")),
    responses(
        (status = 200, description = "Updated department", body = DepartmentResponse),
        (status = 403, description = "Requires Super Admin"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Reserved route held by another department"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_department(
    State(state): State<AppState>,
    Path(id): Path<DepartmentId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Departments, operation::UpdateAll>,
    Json(request): Json<DepartmentUpdate>,
) -> Result<Json<DepartmentResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let current = Departments::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Department", id))?;

    if let Some(route) = required(&request.dashboard_route)
        && is_reserved_route(route)
        && current.dashboard_route.as_deref() != Some(route)
        && let Some(holder) = Departments::new(&mut tx).get_by_dashboard_route(route).await?
        && holder.id != id
    {
        return Err(Error::conflict(format!(
            "The dashboard route '{route}' is reserved for {}",
            holder.name
        )));
    }

    let department = Departments::new(&mut tx)
        .update(
            id,
            &DepartmentUpdateDBRequest {
                name: required(&request.name).map(str::to_string),
                description: request.description.clone(),
                dashboard_route: required(&request.dashboard_route).map(str::to_string),
                is_active: request.is_active,
            },
        )
        .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Updated department: '{}'", department.name)).with_target(
                "Department",
                department.id,
                &department.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(department.into()))
}

#[utoipa::path(
    delete,
    path = "/departments/{id}",
    tag = "departments",
    summary = "Delete a department",
    params(("id" = i64, Path, description = "Department id")),
    responses(
        (status = 200, description = "Deleted; staff and task links are removed", body = MessageResponse),
        (status = 403, description = "Requires Super Admin"),
        (status = 404, description = "Department not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_department(
    State(state): State<AppState>,
    Path(id): Path<DepartmentId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Departments, operation::DeleteAll>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let department = Departments::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Department", id))?;
    Departments::new(&mut tx).delete(id).await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Permanently deleted department: '{}'", department.name)).with_target(
                "Department",
                id,
                &department.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(MessageResponse::new(format!(
        "Department '{}' and all its associations have been permanently deleted.",
        department.name
    ))))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::departments::DepartmentResponse,
        db::handlers::{Repository, Staff},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_reserved_routes_and_duplicate_names(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let (auth_name, auth_value) = add_auth_headers(&superadmin_user(admin.id, &admin.name));

        app.post("/api/departments")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"description": "no name"}))
            .await
            .assert_status_bad_request();

        app.post("/api/departments")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"name": "Sneaky", "dashboard_route": "/admin/accounting"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let response = app
            .post("/api/departments")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"name": "Library", "dashboard_route": "/admin/library"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        app.post("/api/departments")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"name": "Library"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_cannot_take_a_held_reserved_route(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let (auth_name, auth_value) = add_auth_headers(&superadmin_user(admin.id, &admin.name));
        create_test_department(&pool, "Admission Department", Some("/admin/admissions")).await;
        let library = create_test_department(&pool, "Library", None).await;

        app.put(&format!("/api/departments/{}", library.id))
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"dashboard_route": "/admin/admissions"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let renamed: DepartmentResponse = app
            .put(&format!("/api/departments/{}", library.id))
            .add_header(auth_name, auth_value)
            .json(&json!({"name": "Media Center"}))
            .await
            .json();
        assert_eq!(renamed.name, "Media Center");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_unlinks_staff(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let (auth_name, auth_value) = add_auth_headers(&superadmin_user(admin.id, &admin.name));
        let library = create_test_department(&pool, "Library", None).await;
        let staff = create_test_staff(&pool, "Lee", &[library.id]).await;

        app.delete(&format!("/api/departments/{}", library.id))
            .add_header(auth_name, auth_value)
            .await
            .assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let staff = Staff::new(&mut conn).get_by_id(staff.id).await.unwrap().unwrap();
        assert!(staff.department_ids.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_staff_cannot_create_departments(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        app.post("/api/departments")
            .add_header(auth_name, auth_value)
            .json(&json!({"name": "Shadow Cabinet"}))
            .await
            .assert_status_forbidden();
    }
}
