//! Database repository for conversations, messages and the message audit log.
//!
//! Participants are either staff members or the super admin. Each participant row keeps its
//! own `last_read_at` (drives unread counts) and `last_notified_at` (throttles email and push).

use crate::db::{
    errors::Result,
    models::messaging::{
        ConversationSummaryDBResponse, MessageCreateDBRequest, MessageDBResponse, MessageLogCreateDBRequest,
        MessageLogDBResponse, MessagingContact, ParticipantDBResponse, sender_type,
    },
};
use crate::types::{ConversationId, ParticipantRef, StaffId, SuperAdminId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// `(staff_id, super_admin_id)` bind pair for a participant; exactly one is set
fn owner_columns(participant: ParticipantRef) -> (Option<StaffId>, Option<SuperAdminId>) {
    match participant {
        ParticipantRef::Staff(id) => (Some(id), None),
        ParticipantRef::SuperAdmin(id) => (None, Some(id)),
    }
}

fn participant_ref(staff_id: Option<StaffId>, super_admin_id: Option<SuperAdminId>) -> Option<ParticipantRef> {
    match (staff_id, super_admin_id) {
        (Some(id), _) => Some(ParticipantRef::Staff(id)),
        (None, Some(id)) => Some(ParticipantRef::SuperAdmin(id)),
        (None, None) => None,
    }
}

#[derive(Debug, FromRow)]
struct Contact {
    staff_id: Option<StaffId>,
    super_admin_id: Option<SuperAdminId>,
    name: String,
}

#[derive(Debug, FromRow)]
struct Participant {
    staff_id: Option<StaffId>,
    super_admin_id: Option<SuperAdminId>,
    name: String,
    email: String,
    last_read_at: DateTime<Utc>,
    last_notified_at: Option<DateTime<Utc>>,
}

const SELECT_MESSAGES: &str = r#"
    SELECT m.*, COALESCE(s.name, sa.name, '') AS sender_name
    FROM messages m
    LEFT JOIN staff s ON m.sender_type = 'staff' AND s.id = m.sender_id
    LEFT JOIN super_admins sa ON m.sender_type = 'superadmin' AND sa.id = m.sender_id
"#;

pub struct Conversations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Conversations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Every staff member and the super admin, except `me`
    #[instrument(skip(self), fields(me = %me), err)]
    pub async fn contacts(&mut self, me: ParticipantRef) -> Result<Vec<MessagingContact>> {
        let (my_staff_id, my_admin_id) = owner_columns(me);
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id AS staff_id, NULL::bigint AS super_admin_id, name FROM staff
            WHERE id IS DISTINCT FROM $1
            UNION ALL
            SELECT NULL::bigint, id, name FROM super_admins
            WHERE id IS DISTINCT FROM $2
            ORDER BY name
            "#,
        )
        .bind(my_staff_id)
        .bind(my_admin_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(contacts
            .into_iter()
            .filter_map(|c| {
                participant_ref(c.staff_id, c.super_admin_id).map(|participant| MessagingContact { participant, name: c.name })
            })
            .collect())
    }

    /// Open a conversation between the given participants; duplicates collapse into one row
    #[instrument(skip(self, participants), fields(count = participants.len()), err)]
    pub async fn create(&mut self, participants: &[ParticipantRef]) -> Result<ConversationId> {
        let conversation_id: ConversationId = sqlx::query_scalar("INSERT INTO conversations DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *self.db)
            .await?;

        let (staff_ids, admin_ids): (Vec<_>, Vec<_>) = participants.iter().map(|p| owner_columns(*p)).unzip();
        let staff_ids: Vec<StaffId> = staff_ids.into_iter().flatten().collect();
        let admin_ids: Vec<SuperAdminId> = admin_ids.into_iter().flatten().collect();

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, staff_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(&staff_ids)
        .execute(&mut *self.db)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, super_admin_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(&admin_ids)
        .execute(&mut *self.db)
        .await?;

        Ok(conversation_id)
    }

    #[instrument(skip(self), fields(participant = %participant), err)]
    pub async fn is_participant(&mut self, conversation_id: ConversationId, participant: ParticipantRef) -> Result<bool> {
        let (staff_id, admin_id) = owner_columns(participant);
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM conversation_participants
                WHERE conversation_id = $1 AND (staff_id = $2 OR super_admin_id = $3)
            )
            "#,
        )
        .bind(conversation_id)
        .bind(staff_id)
        .bind(admin_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(exists)
    }

    #[instrument(skip(self), err)]
    pub async fn participants(&mut self, conversation_id: ConversationId) -> Result<Vec<ParticipantDBResponse>> {
        let rows = sqlx::query_as::<_, Participant>(
            r#"
            SELECT cp.staff_id, cp.super_admin_id,
                   COALESCE(s.name, sa.name, '') AS name,
                   COALESCE(s.email, sa.email, '') AS email,
                   cp.last_read_at, cp.last_notified_at
            FROM conversation_participants cp
            LEFT JOIN staff s ON s.id = cp.staff_id
            LEFT JOIN super_admins sa ON sa.id = cp.super_admin_id
            WHERE cp.conversation_id = $1
            ORDER BY cp.id
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|p| {
                participant_ref(p.staff_id, p.super_admin_id).map(|participant| ParticipantDBResponse {
                    participant,
                    name: p.name,
                    email: p.email,
                    last_read_at: p.last_read_at,
                    last_notified_at: p.last_notified_at,
                })
            })
            .collect())
    }

    /// Inbox for `me`, most recently active first
    #[instrument(skip(self), fields(me = %me), err)]
    pub async fn summaries(&mut self, me: ParticipantRef) -> Result<Vec<ConversationSummaryDBResponse>> {
        let (staff_id, admin_id) = owner_columns(me);
        let summaries = sqlx::query_as::<_, ConversationSummaryDBResponse>(
            r#"
            SELECT
                c.id,
                COALESCE((
                    SELECT array_agg(COALESCE(s.name, sa.name, '') ORDER BY other.id)
                    FROM conversation_participants other
                    LEFT JOIN staff s ON s.id = other.staff_id
                    LEFT JOIN super_admins sa ON sa.id = other.super_admin_id
                    WHERE other.conversation_id = c.id AND other.id <> me.id
                ), '{}') AS other_participant_names,
                last.content AS last_message,
                last.created_at AS last_message_time,
                (
                    SELECT COUNT(*) FROM messages m
                    WHERE m.conversation_id = c.id
                      AND m.created_at > me.last_read_at
                      AND NOT (m.sender_type = $3 AND m.sender_id = $4)
                ) AS unread_count
            FROM conversation_participants me
            JOIN conversations c ON c.id = me.conversation_id
            LEFT JOIN LATERAL (
                SELECT content, created_at FROM messages
                WHERE conversation_id = c.id
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            ) last ON TRUE
            WHERE me.staff_id = $1 OR me.super_admin_id = $2
            ORDER BY COALESCE(last.created_at, c.updated_at) DESC, c.id DESC
            "#,
        )
        .bind(staff_id)
        .bind(admin_id)
        .bind(sender_type(&me))
        .bind(me.id())
        .fetch_all(&mut *self.db)
        .await?;

        Ok(summaries)
    }

    /// Oldest first
    #[instrument(skip(self), err)]
    pub async fn messages(&mut self, conversation_id: ConversationId) -> Result<Vec<MessageDBResponse>> {
        let messages = sqlx::query_as::<_, MessageDBResponse>(&format!(
            "{SELECT_MESSAGES} WHERE m.conversation_id = $1 ORDER BY m.created_at, m.id"
        ))
        .bind(conversation_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(messages)
    }

    #[instrument(skip(self), fields(participant = %participant), err)]
    pub async fn mark_read(&mut self, conversation_id: ConversationId, participant: ParticipantRef) -> Result<()> {
        let (staff_id, admin_id) = owner_columns(participant);
        sqlx::query(
            r#"
            UPDATE conversation_participants SET last_read_at = NOW()
            WHERE conversation_id = $1 AND (staff_id = $2 OR super_admin_id = $3)
            "#,
        )
        .bind(conversation_id)
        .bind(staff_id)
        .bind(admin_id)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(participant = %participant), err)]
    pub async fn mark_notified(&mut self, conversation_id: ConversationId, participant: ParticipantRef) -> Result<()> {
        let (staff_id, admin_id) = owner_columns(participant);
        sqlx::query(
            r#"
            UPDATE conversation_participants SET last_notified_at = NOW()
            WHERE conversation_id = $1 AND (staff_id = $2 OR super_admin_id = $3)
            "#,
        )
        .bind(conversation_id)
        .bind(staff_id)
        .bind(admin_id)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Store a message and bump the conversation's `updated_at`
    #[instrument(skip(self, request), fields(conversation_id = request.conversation_id), err)]
    pub async fn add_message(&mut self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let message = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            WITH inserted AS (
                INSERT INTO messages (conversation_id, sender_type, sender_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT m.*, COALESCE(s.name, sa.name, '') AS sender_name
            FROM inserted m
            LEFT JOIN staff s ON m.sender_type = 'staff' AND s.id = m.sender_id
            LEFT JOIN super_admins sa ON m.sender_type = 'superadmin' AND sa.id = m.sender_id
            "#,
        )
        .bind(request.conversation_id)
        .bind(sender_type(&request.sender))
        .bind(request.sender.id())
        .bind(&request.content)
        .fetch_one(&mut *self.db)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(request.conversation_id)
            .execute(&mut *self.db)
            .await?;

        Ok(message)
    }

    #[instrument(skip(self, entry), fields(conversation_id = entry.conversation_id), err)]
    pub async fn log_message(&mut self, entry: &MessageLogCreateDBRequest) -> Result<MessageLogDBResponse> {
        let log = sqlx::query_as::<_, MessageLogDBResponse>(
            r#"
            INSERT INTO message_logs (conversation_id, sender_id, sender_type, sender_name, recipient_names, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.conversation_id)
        .bind(entry.sender.id())
        .bind(sender_type(&entry.sender))
        .bind(&entry.sender_name)
        .bind(&entry.recipient_names)
        .bind(&entry.content)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    /// Newest first, optionally limited to one conversation
    #[instrument(skip(self), err)]
    pub async fn list_logs(
        &mut self,
        conversation_id: Option<ConversationId>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MessageLogDBResponse>> {
        let logs = sqlx::query_as::<_, MessageLogDBResponse>(
            r#"
            SELECT * FROM message_logs
            WHERE ($1::bigint IS NULL OR conversation_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }

    #[instrument(skip(self), err)]
    pub async fn count_logs(&mut self, conversation_id: Option<ConversationId>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_logs WHERE ($1::bigint IS NULL OR conversation_id = $1)")
            .bind(conversation_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_staff, create_test_superadmin};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_contacts_exclude_me(pool: PgPool) {
        let alice = create_test_staff(&pool, "Alice", &[]).await;
        create_test_staff(&pool, "Bob", &[]).await;
        let admin = create_test_superadmin(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        let contacts = repo.contacts(ParticipantRef::Staff(alice.id)).await.unwrap();
        let names: Vec<_> = contacts.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Bob"));
        assert!(!names.contains(&"Alice"));
        assert!(contacts.iter().any(|c| c.participant == ParticipantRef::SuperAdmin(admin.id)));

        let admin_view = repo.contacts(ParticipantRef::SuperAdmin(admin.id)).await.unwrap();
        assert_eq!(admin_view.len(), 2);
        assert!(admin_view.iter().all(|c| c.participant.role() == crate::types::Role::Staff));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unread_counts_and_mark_read(pool: PgPool) {
        let alice = create_test_staff(&pool, "Alice", &[]).await;
        let bob = create_test_staff(&pool, "Bob", &[]).await;
        let (a, b) = (ParticipantRef::Staff(alice.id), ParticipantRef::Staff(bob.id));

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);
        let conversation_id = repo.create(&[a, b, a]).await.unwrap();
        assert_eq!(repo.participants(conversation_id).await.unwrap().len(), 2);

        let empty = repo.summaries(b).await.unwrap();
        assert_eq!(empty[0].last_message, None);
        assert_eq!(empty[0].other_participant_names, ["Alice"]);

        for content in ["hi", "are you there?"] {
            repo.add_message(&MessageCreateDBRequest {
                conversation_id,
                sender: a,
                content: content.to_string(),
            })
            .await
            .unwrap();
        }

        let inbox = repo.summaries(b).await.unwrap();
        assert_eq!(inbox[0].unread_count, 2);
        assert_eq!(inbox[0].last_message.as_deref(), Some("are you there?"));
        assert_eq!(repo.summaries(a).await.unwrap()[0].unread_count, 0);

        repo.mark_read(conversation_id, b).await.unwrap();
        assert_eq!(repo.summaries(b).await.unwrap()[0].unread_count, 0);

        let messages = repo.messages(conversation_id).await.unwrap();
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[0].sender_name, "Alice");
        assert_eq!(messages[0].sender_type, "staff");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_membership_and_notification_tracking(pool: PgPool) {
        let alice = create_test_staff(&pool, "Alice", &[]).await;
        let admin = create_test_superadmin(&pool).await;
        let carol = create_test_staff(&pool, "Carol", &[]).await;
        let (a, s) = (ParticipantRef::Staff(alice.id), ParticipantRef::SuperAdmin(admin.id));

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);
        let conversation_id = repo.create(&[a, s]).await.unwrap();

        assert!(repo.is_participant(conversation_id, s).await.unwrap());
        assert!(!repo.is_participant(conversation_id, ParticipantRef::Staff(carol.id)).await.unwrap());

        repo.mark_notified(conversation_id, s).await.unwrap();
        let participants = repo.participants(conversation_id).await.unwrap();
        let admin_row = participants.iter().find(|p| p.participant == s).unwrap();
        assert!(admin_row.last_notified_at.is_some());
        assert_eq!(admin_row.email, admin.email);
        let alice_row = participants.iter().find(|p| p.participant == a).unwrap();
        assert!(alice_row.last_notified_at.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_message_logs_filter_by_conversation(pool: PgPool) {
        let alice = create_test_staff(&pool, "Alice", &[]).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        for (conversation_id, content) in [(1, "one"), (2, "two"), (1, "three")] {
            repo.log_message(&MessageLogCreateDBRequest {
                conversation_id,
                sender: ParticipantRef::Staff(alice.id),
                sender_name: "Alice".to_string(),
                recipient_names: "Bob".to_string(),
                content: content.to_string(),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.count_logs(None).await.unwrap(), 3);
        assert_eq!(repo.count_logs(Some(1)).await.unwrap(), 2);

        let logs = repo.list_logs(Some(1), 0, 10).await.unwrap();
        assert_eq!(logs.iter().map(|l| l.content.as_str()).collect::<Vec<_>>(), ["three", "one"]);
        assert_eq!(repo.list_logs(None, 2, 10).await.unwrap().len(), 1);
    }
}
