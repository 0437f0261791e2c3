//! Database models for conversations, messages and the message log.

use crate::types::{ConversationId, MessageId, ParticipantRef, Role};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// `sender_type` column value for a participant
pub fn sender_type(participant: &ParticipantRef) -> &'static str {
    match participant.role() {
        Role::Staff => "staff",
        Role::SuperAdmin => "superadmin",
    }
}

/// Someone who can be added to a conversation
#[derive(Debug, Clone)]
pub struct MessagingContact {
    pub participant: ParticipantRef,
    pub name: String,
}

/// A conversation participant with contact and read-tracking details
#[derive(Debug, Clone)]
pub struct ParticipantDBResponse {
    pub participant: ParticipantRef,
    pub name: String,
    pub email: String,
    pub last_read_at: DateTime<Utc>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// One row of a principal's inbox
#[derive(Debug, Clone, FromRow)]
pub struct ConversationSummaryDBResponse {
    pub id: ConversationId,
    /// Names of the other participants
    pub other_participant_names: Vec<String>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

#[derive(Debug, Clone)]
pub struct MessageCreateDBRequest {
    pub conversation_id: ConversationId,
    pub sender: ParticipantRef,
    pub content: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageDBResponse {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_type: String,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender_name: String,
}

#[derive(Debug, Clone)]
pub struct MessageLogCreateDBRequest {
    pub conversation_id: ConversationId,
    pub sender: ParticipantRef,
    pub sender_name: String,
    pub recipient_names: String,
    pub content: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageLogDBResponse {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub sender_id: i64,
    pub sender_type: String,
    pub sender_name: String,
    pub recipient_names: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
