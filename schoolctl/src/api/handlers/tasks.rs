//! Follow-up tasks on admission leads.

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
            auth::{CurrentUser, required},
            tasks::{TaskCount, TaskCreate, TaskResponse, TaskStatusUpdate, TaskUpdate, parse_due_date},
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{ActivityLogs, Leads, Staff, Tasks},
        models::tasks::{COMPLETED_TASK_STATUS, TaskCreateDBRequest, TaskDBResponse, TaskUpdateDBRequest},
    },
    errors::{Error, Result},
    notifications::{NotificationTarget, notify_staff},
    types::TaskId,
};
use sqlx::PgConnection;

/// Activity wording for a status change
fn status_action(title: &str, status: &str) -> String {
    if status == COMPLETED_TASK_STATUS {
        format!("Completed task: '{title}'")
    } else {
        format!("Updated task '{title}' status to '{status}'")
    }
}

async fn task_by_id(conn: &mut PgConnection, id: TaskId) -> Result<TaskDBResponse> {
    Tasks::new(conn).get_by_id(id).await?.ok_or_else(|| Error::not_found("Task", id))
}

#[utoipa::path(
    get,
    path = "/tasks/my-tasks",
    tag = "tasks",
    summary = "My tasks",
    responses((status = 200, description = "Tasks assigned to me or my departments", body = Vec<TaskResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn my_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Tasks, operation::ReadAll>,
) -> Result<Json<Vec<TaskResponse>>> {
    let Some(staff_id) = current_user.staff_id() else {
        return Ok(Json(Vec::new()));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tasks = Tasks::new(&mut conn).list_for_staff(staff_id).await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/tasks/my-tasks/count",
    tag = "tasks",
    summary = "Count my open tasks",
    responses((status = 200, description = "Open tasks assigned to me", body = TaskCount)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn my_task_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Tasks, operation::ReadAll>,
) -> Result<Json<TaskCount>> {
    let Some(staff_id) = current_user.staff_id() else {
        return Ok(Json(TaskCount { count: 0 }));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let count = Tasks::new(&mut conn).count_open_for_staff(staff_id).await?;
    Ok(Json(TaskCount { count }))
}

#[utoipa::path(
    get,
    path = "/tasks/lead/{token}",
    tag = "tasks",
    summary = "Tasks for a lead",
    params(("token" = String, Path, description = "Lead secure token")),
    responses(
        (status = 200, description = "Tasks for the lead, newest first", body = Vec<TaskResponse>),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn lead_tasks(
    State(state): State<AppState>,
    Path(token): Path<String>,
    _: RequiresPermission<resource::Tasks, operation::ReadAll>,
) -> Result<Json<Vec<TaskResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = Leads::new(&mut conn)
        .get_by_token(&token)
        .await?
        .ok_or_else(|| Error::not_found("Lead", &token))?;

    let tasks = Tasks::new(&mut conn).list_for_lead(lead.id).await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/tasks",
    request_body = TaskCreate,
    tag = "tasks",
    summary = "Create a task",
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Missing title, lead or assignment, or bad due date"),
        (status = 404, description = "Lead not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Tasks, operation::CreateAll>,
    Json(request): Json<TaskCreate>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    let (Some(title), Some(lead_id)) = (required(&request.title), request.lead_id) else {
        return Err(Error::bad_request("Title and lead are required"));
    };
    if request.assigned_department_ids.is_empty() && request.assigned_staff_ids.is_empty() {
        return Err(Error::bad_request("Assign the task to at least one department or staff member"));
    }
    let due_date = parse_due_date(request.due_date.as_deref()).map_err(Error::bad_request)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let lead = Leads::new(&mut tx)
        .get_by_id(lead_id)
        .await?
        .ok_or_else(|| Error::not_found("Lead", lead_id))?;

    let created_by_staff_id = match current_user.staff_id() {
        Some(id) => id,
        None => Staff::new(&mut tx)
            .first_staff_id()
            .await?
            .ok_or_else(|| Error::bad_request("Create a staff member before creating tasks"))?,
    };

    let task = Tasks::new(&mut tx)
        .create(&TaskCreateDBRequest {
            title: title.to_string(),
            note: request.note.clone(),
            due_date,
            lead_id,
            created_by_staff_id,
            department_ids: request.assigned_department_ids.clone(),
            staff_ids: request.assigned_staff_ids.clone(),
        })
        .await?;

    let student_name = lead.primary_student_name().unwrap_or_default();
    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Created a new task: '{}'", task.title)).with_target(
                "Lead",
                lead.id,
                &student_name,
            ),
        )
        .await?;

    let recipients = Staff::new(&mut tx)
        .contacts_for_assignment(&request.assigned_department_ids, &request.assigned_staff_ids)
        .await?;
    let emails = notify_staff(
        &mut tx,
        &recipients,
        &format!(
            "{} assigned you a new task: '{}' for the lead {student_name}.",
            current_user.name, task.title
        ),
        &NotificationTarget::Task {
            id: task.id,
            lead_secure_token: lead.secure_token.clone(),
        },
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    emails.dispatch(&state);

    Ok((StatusCode::CREATED, Json(task.into())))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    request_body = TaskUpdate,
    tag = "tasks",
    summary = "Update a task",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 400, description = "Bad due date"),
        (status = 404, description = "Task not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Tasks, operation::UpdateAll>,
    Json(request): Json<TaskUpdate>,
) -> Result<Json<TaskResponse>> {
    let due_date = parse_due_date(request.due_date.as_deref()).map_err(Error::bad_request)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let before = task_by_id(&mut tx, id).await?;

    let status = required(&request.status).map(str::to_string);
    Tasks::new(&mut tx)
        .update(
            id,
            &TaskUpdateDBRequest {
                title: required(&request.title).map(str::to_string),
                note: request.note.clone(),
                due_date,
                status: status.clone(),
            },
        )
        .await?;
    let title = required(&request.title).unwrap_or(&before.title).to_string();

    if let Some(status) = status.as_deref()
        && status != before.status
    {
        ActivityLogs::new(&mut tx)
            .create(&activity_entry(&current_user, status_action(&title, status)).with_target("Task", id, &title))
            .await?;
    }

    if let Some(lead_status) = required(&request.lead_status) {
        Leads::new(&mut tx).set_status(before.lead_id, lead_status).await?;
        ActivityLogs::new(&mut tx)
            .create(
                &activity_entry(&current_user, format!("Updated lead status to '{lead_status}'")).with_target(
                    "Lead",
                    before.lead_id,
                    before.lead_student_name.clone().unwrap_or_default(),
                ),
            )
            .await?;
    }

    let mut emails = None;
    if request.assigned_department_ids.is_some() || request.assigned_staff_ids.is_some() {
        // Reassignment replaces both lists; an omitted list clears it
        let department_ids = request.assigned_department_ids.clone().unwrap_or_default();
        let staff_ids = request.assigned_staff_ids.clone().unwrap_or_default();
        Tasks::new(&mut tx).replace_assignments(id, &department_ids, &staff_ids).await?;

        let recipients = Staff::new(&mut tx).contacts_for_assignment(&department_ids, &staff_ids).await?;
        emails = Some(
            notify_staff(
                &mut tx,
                &recipients,
                &format!("{} assigned you a task: '{title}'.", current_user.name),
                &NotificationTarget::Task {
                    id,
                    lead_secure_token: before.lead_secure_token.clone(),
                },
            )
            .await?,
        );
    }

    let task = task_by_id(&mut tx, id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(emails) = emails {
        emails.dispatch(&state);
    }

    Ok(Json(task.into()))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}/status",
    request_body = TaskStatusUpdate,
    tag = "tasks",
    summary = "Set task status",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 400, description = "Status missing"),
        (status = 404, description = "Task not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_task_status(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Tasks, operation::UpdateAll>,
    Json(request): Json<TaskStatusUpdate>,
) -> Result<Json<TaskResponse>> {
    let status = required(&request.status).ok_or_else(|| Error::bad_request("Status is required"))?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let before = task_by_id(&mut tx, id).await?;
    Tasks::new(&mut tx).set_status(id, status).await?;

    if status != before.status {
        ActivityLogs::new(&mut tx)
            .create(&activity_entry(&current_user, status_action(&before.title, status)).with_target("Task", id, &before.title))
            .await?;
    }

    let task = task_by_id(&mut tx, id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(task.into()))
}

#[cfg(test)]
mod tests {
    use super::status_action;
    use crate::{
        api::models::tasks::{TaskCount, TaskResponse},
        db::handlers::{ActivityLogs, Leads, Notifications},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn test_status_action_wording() {
        assert_eq!(status_action("Call family", "Completed"), "Completed task: 'Call family'");
        assert_eq!(
            status_action("Call family", "In Progress"),
            "Updated task 'Call family' status to 'In Progress'"
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_task_notifies_assignees_once(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admissions = create_test_department(&pool, "Admission Department", None).await;
        let creator = create_test_staff(&pool, "Casey Creator", &[]).await;
        let member = create_test_staff(&pool, "Morgan Member", &[admissions.id]).await;
        let lead = create_test_lead(&pool, "Max").await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(creator.id, &creator.name, &[]));

        let response = app
            .post("/api/tasks")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({
                "title": "Call family",
                "lead_id": lead.id,
                "due_date": "2026-11-01",
                "assigned_department_ids": [admissions.id],
                "assigned_staff_ids": [member.id]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let task: TaskResponse = response.json();
        assert_eq!(task.status, "To-Do");
        assert_eq!(task.created_by_staff_id, creator.id);
        assert_eq!(task.lead_student_name.as_deref(), Some("Max Student"));

        let mut conn = pool.acquire().await.unwrap();
        let notes = Notifications::new(&mut conn).list_unread(member.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(
            notes[0].message,
            "Casey Creator assigned you a new task: 'Call family' for the lead Max Student."
        );

        let member_auth = add_auth_headers(&staff_user(member.id, &member.name, &["Admission Department"]));
        let count: TaskCount = app
            .get("/api/tasks/my-tasks/count")
            .add_header(member_auth.0.clone(), member_auth.1.clone())
            .await
            .json();
        assert_eq!(count.count, 1);

        app.put(&format!("/api/tasks/{}/status", task.id))
            .add_header(member_auth.0.clone(), member_auth.1.clone())
            .json(&json!({"status": "Completed"}))
            .await
            .assert_status_ok();

        let count: TaskCount = app
            .get("/api/tasks/my-tasks/count")
            .add_header(member_auth.0, member_auth.1)
            .await
            .json();
        assert_eq!(count.count, 0);

        let log = ActivityLogs::new(&mut conn).list(0, 1).await.unwrap();
        assert_eq!(log[0].action, "Completed task: 'Call family'");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_task_validation(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let lead = create_test_lead(&pool, "Max").await;
        let (auth_name, auth_value) = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));

        app.post("/api/tasks")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"title": "Nobody's job", "lead_id": lead.id}))
            .await
            .assert_status_bad_request();

        app.post("/api/tasks")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"title": "Bad date", "lead_id": lead.id, "assigned_staff_ids": [staff.id], "due_date": "soon"}))
            .await
            .assert_status_bad_request();

        app.post("/api/tasks")
            .add_header(auth_name, auth_value)
            .json(&json!({"title": "Ghost lead", "lead_id": 424242, "assigned_staff_ids": [staff.id]}))
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_superadmin_task_uses_first_staff_and_updates_lead(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let admin = create_test_superadmin(&pool).await;
        let staff = create_test_staff(&pool, "Sam", &[]).await;
        let other = create_test_staff(&pool, "Riley", &[]).await;
        let lead = create_test_lead(&pool, "Max").await;
        let tours = create_test_department(&pool, "Tours", None).await;
        let (auth_name, auth_value) = add_auth_headers(&superadmin_user(admin.id, &admin.name));

        let task: TaskResponse = app
            .post("/api/tasks")
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({
                "title": "Tour",
                "lead_id": lead.id,
                "assigned_department_ids": [tours.id],
                "assigned_staff_ids": [staff.id]
            }))
            .await
            .json();
        assert_eq!(task.created_by_staff_id, staff.id);
        assert_eq!(task.assigned_department_ids, vec![tours.id]);

        let updated: TaskResponse = app
            .put(&format!("/api/tasks/{}", task.id))
            .add_header(auth_name.clone(), auth_value.clone())
            .json(&json!({"lead_status": "Toured", "assigned_staff_ids": [other.id]}))
            .await
            .json();
        assert_eq!(updated.assigned_staff_ids, vec![other.id]);
        // Sending only staff replaces the whole assignment
        assert!(updated.assigned_department_ids.is_empty());

        let mut conn = pool.acquire().await.unwrap();
        let lead_now = Leads::new(&mut conn).get_by_id(lead.id).await.unwrap().unwrap();
        assert_eq!(lead_now.status, "Toured");
        let notes = Notifications::new(&mut conn).list_unread(other.id).await.unwrap();
        assert_eq!(notes[0].message, "Head Principal assigned you a task: 'Tour'.");

        let lead_tasks: Vec<TaskResponse> = app
            .get(&format!("/api/tasks/lead/{}", lead.secure_token))
            .add_header(auth_name.clone(), auth_value.clone())
            .await
            .json();
        assert_eq!(lead_tasks.len(), 1);

        let mine: Vec<TaskResponse> = app
            .get("/api/tasks/my-tasks")
            .add_header(auth_name, auth_value)
            .await
            .json();
        assert!(mine.is_empty());
    }
}
