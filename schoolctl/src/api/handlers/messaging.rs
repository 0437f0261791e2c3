//! Internal messaging between staff and the super admin.
//!
//! Each new message notifies the other participants in-app (staff only). Email and push
//! alerts are rate limited per participant by `messaging.notification_cooldown`, so a burst of
//! messages produces one alert.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        auth::{CurrentUser, required},
        messaging::{
            ContactResponse, ConversationCreate, ConversationCreated, ConversationSummary, MessageCreate, MessageLogQuery,
            MessageLogResponse, MessageResponse,
        },
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Conversations, Notifications},
        models::{
            messaging::{MessageCreateDBRequest, MessageLogCreateDBRequest, ParticipantDBResponse},
            notifications::NotificationCreateDBRequest,
        },
    },
    errors::{Error, Result},
    notifications::{MESSAGING_LINK, NotificationTarget},
    push::PushMessage,
    types::{ConversationId, ParticipantRef},
};
use sqlx::PgConnection;

async fn ensure_participant(conn: &mut PgConnection, conversation_id: ConversationId, user: &CurrentUser) -> Result<()> {
    if Conversations::new(conn).is_participant(conversation_id, user.participant()).await? {
        Ok(())
    } else {
        Err(Error::forbidden("You are not a participant in this conversation."))
    }
}

/// Whether a participant is due another email/push alert
fn alert_due(participant: &ParticipantDBResponse, cooldown: std::time::Duration) -> bool {
    match participant.last_notified_at {
        None => true,
        Some(last) => (Utc::now() - last).to_std().map(|elapsed| elapsed >= cooldown).unwrap_or(false),
    }
}

#[utoipa::path(
    get,
    path = "/messaging/users",
    tag = "messaging",
    summary = "People I can message",
    responses((status = 200, description = "Other staff and the super admin", body = Vec<ContactResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_contacts(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<ContactResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let contacts = Conversations::new(&mut conn).contacts(current_user.participant()).await?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/messaging/conversations",
    tag = "messaging",
    summary = "My conversations",
    responses((status = 200, description = "Conversations, most recent activity first", body = Vec<ConversationSummary>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_conversations(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ConversationSummary>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let summaries = Conversations::new(&mut conn).summaries(current_user.participant()).await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/messaging/conversations",
    request_body = ConversationCreate,
    tag = "messaging",
    summary = "Start a conversation",
    responses(
        (status = 201, description = "Conversation created", body = ConversationCreated),
        (status = 400, description = "No participants or an invalid participant id"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_conversation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ConversationCreate>,
) -> Result<(StatusCode, Json<ConversationCreated>)> {
    if request.participant_ids.is_empty() {
        return Err(Error::bad_request("At least one participant is required"));
    }

    let mut participants = request
        .participant_ids
        .iter()
        .map(|id| id.parse::<ParticipantRef>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::bad_request)?;
    participants.push(current_user.participant());

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conversation_id = Conversations::new(&mut tx).create(&participants).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationCreated {
            message: "Conversation created successfully".to_string(),
            conversation_id,
        }),
    ))
}

/// Messages oldest first; opening a conversation marks it read
#[utoipa::path(
    get,
    path = "/messaging/conversations/{id}/messages",
    tag = "messaging",
    summary = "Read a conversation",
    params(("id" = i64, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<MessageResponse>),
        (status = 403, description = "Not a participant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<MessageResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_participant(&mut tx, conversation_id, &current_user).await?;

    let mut repo = Conversations::new(&mut tx);
    repo.mark_read(conversation_id, current_user.participant()).await?;
    let messages = repo.messages(conversation_id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/messaging/conversations/{id}/messages",
    request_body = MessageCreate,
    tag = "messaging",
    summary = "Send a message",
    params(("id" = i64, Path, description = "Conversation id")),
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Empty message"),
        (status = 403, description = "Not a participant"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    current_user: CurrentUser,
    Json(request): Json<MessageCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let content = required(&request.content).ok_or_else(|| Error::bad_request("Message content cannot be empty"))?;
    let me = current_user.participant();

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_participant(&mut tx, conversation_id, &current_user).await?;

    let mut repo = Conversations::new(&mut tx);
    let message = repo
        .add_message(&MessageCreateDBRequest {
            conversation_id,
            sender: me,
            content: content.to_string(),
        })
        .await?;

    let others: Vec<ParticipantDBResponse> = repo
        .participants(conversation_id)
        .await?
        .into_iter()
        .filter(|p| p.participant != me)
        .collect();

    repo.log_message(&MessageLogCreateDBRequest {
        conversation_id,
        sender: me,
        sender_name: current_user.name.clone(),
        recipient_names: others.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", "),
        content: content.to_string(),
    })
    .await?;

    let cooldown = state.config.messaging.notification_cooldown;
    let mut alerts = Vec::new();
    for other in &others {
        if alert_due(other, cooldown) {
            Conversations::new(&mut tx).mark_notified(conversation_id, other.participant).await?;
            alerts.push(other.clone());
        }
    }

    let target = NotificationTarget::Conversation { id: conversation_id };
    let mut notifications = Notifications::new(&mut tx);
    for other in &others {
        if let ParticipantRef::Staff(staff_id) = other.participant {
            notifications
                .create(&NotificationCreateDBRequest {
                    staff_id,
                    message: format!("You have a new message from {}.", current_user.name),
                    target_type: Some(target.target_type().to_string()),
                    target_id: Some(target.target_id()),
                    target_link: Some(target.link()),
                })
                .await?;
        }
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let link = state.config.frontend_link(MESSAGING_LINK);
    let push = PushMessage {
        title: format!("New Message from {}", current_user.name),
        body: content.to_string(),
        url: MESSAGING_LINK.to_string(),
    };
    for recipient in alerts {
        let state = state.clone();
        let sender_name = current_user.name.clone();
        let link = link.clone();
        let push = push.clone();
        tokio::spawn(async move {
            if let Err(e) = state
                .email
                .send_message_alert(&recipient.email, Some(&recipient.name), &sender_name, &link)
                .await
            {
                tracing::warn!(recipient = %recipient.participant, "Failed to send message alert email: {}", e);
            }
            let outcome = state.push.send_to(&state.db, recipient.participant, &push).await;
            tracing::debug!(recipient = %recipient.participant, ?outcome, "Message push attempted");
        });
    }

    Ok((StatusCode::CREATED, Json(message.into())))
}

#[utoipa::path(
    get,
    path = "/administration/message-logs",
    tag = "messaging",
    summary = "Message log",
    params(MessageLogQuery),
    responses((status = 200, description = "Sent messages, newest first", body = PaginatedResponse<MessageLogResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_message_logs(
    State(state): State<AppState>,
    Query(query): Query<MessageLogQuery>,
    _: RequiresPermission<resource::MessageLogs, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<MessageLogResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Conversations::new(&mut conn);
    let logs = repo.list_logs(query.conversation_id, skip, limit).await?;
    let total_count = repo.count_logs(query.conversation_id).await?;

    Ok(Json(PaginatedResponse::new(
        logs.into_iter().map(Into::into).collect(),
        total_count,
        skip,
        limit,
    )))
}
