//! API request/response models for internal messaging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::db::models::messaging::{ConversationSummaryDBResponse, MessageDBResponse, MessageLogDBResponse, MessagingContact};
use crate::types::{ConversationId, MessageId};

/// Shown in the inbox when a conversation has no messages
pub const NO_MESSAGES_PLACEHOLDER: &str = "No messages yet.";

/// Someone the caller can start a conversation with
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    /// `staff_{id}` or `superadmin_{id}`
    pub id: String,
    pub name: String,
    /// `Staff` or `Super Admin`
    pub role: String,
}

impl From<MessagingContact> for ContactResponse {
    fn from(contact: MessagingContact) -> Self {
        Self {
            id: contact.participant.to_string(),
            name: contact.name,
            role: contact.participant.role().label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationSummary {
    pub id: ConversationId,
    /// The other participants, comma separated, or `Yourself`
    pub participant_names: String,
    pub last_message: String,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

impl From<ConversationSummaryDBResponse> for ConversationSummary {
    fn from(db: ConversationSummaryDBResponse) -> Self {
        let participant_names = if db.other_participant_names.is_empty() {
            "Yourself".to_string()
        } else {
            db.other_participant_names.join(", ")
        };

        Self {
            id: db.id,
            participant_names,
            last_message: db.last_message.unwrap_or_else(|| NO_MESSAGES_PLACEHOLDER.to_string()),
            last_message_time: db.last_message_time,
            unread_count: db.unread_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ConversationCreate {
    /// Participant ids such as `staff_3`; the caller is always added
    pub participant_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationCreated {
    pub message: String,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct MessageCreate {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_type: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDBResponse> for MessageResponse {
    fn from(db: MessageDBResponse) -> Self {
        Self {
            id: db.id,
            conversation_id: db.conversation_id,
            sender_type: db.sender_type,
            sender_id: db.sender_id,
            sender_name: db.sender_name,
            content: db.content,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageLogResponse {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub sender_id: i64,
    pub sender_type: String,
    pub sender_name: String,
    pub recipient_names: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessageLogDBResponse> for MessageLogResponse {
    fn from(db: MessageLogDBResponse) -> Self {
        Self {
            id: db.id,
            conversation_id: db.conversation_id,
            sender_id: db.sender_id,
            sender_type: db.sender_type,
            sender_name: db.sender_name,
            recipient_names: db.recipient_names,
            content: db.content,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for the message log
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MessageLogQuery {
    /// Only this conversation
    pub conversation_id: Option<ConversationId>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticipantRef;

    #[test]
    fn test_summary_placeholders() {
        let summary = ConversationSummary::from(ConversationSummaryDBResponse {
            id: 1,
            other_participant_names: vec![],
            last_message: None,
            last_message_time: None,
            unread_count: 0,
        });
        assert_eq!(summary.participant_names, "Yourself");
        assert_eq!(summary.last_message, NO_MESSAGES_PLACEHOLDER);

        let summary = ConversationSummary::from(ConversationSummaryDBResponse {
            id: 2,
            other_participant_names: vec!["Alice".to_string(), "Bob".to_string()],
            last_message: Some("hi".to_string()),
            last_message_time: Some(Utc::now()),
            unread_count: 3,
        });
        assert_eq!(summary.participant_names, "Alice, Bob");
        assert_eq!(summary.last_message, "hi");
    }

    #[test]
    fn test_contact_ids_and_roles() {
        let contact = ContactResponse::from(MessagingContact {
            participant: ParticipantRef::SuperAdmin(1),
            name: "Head".to_string(),
        });
        assert_eq!(contact.id, "superadmin_1");
        assert_eq!(contact.role, "Super Admin");
    }
}
