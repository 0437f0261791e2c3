//! Database repository for in-app notifications.

use crate::db::{
    errors::Result,
    models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
};
use crate::types::StaffId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(staff_id = request.staff_id), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            INSERT INTO notifications (staff_id, message, target_type, target_id, target_link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.staff_id)
        .bind(&request.message)
        .bind(&request.target_type)
        .bind(request.target_id)
        .bind(&request.target_link)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(notification)
    }

    /// Unread notifications for one staff member, newest first
    #[instrument(skip(self), err)]
    pub async fn list_unread(&mut self, staff_id: StaffId) -> Result<Vec<NotificationDBResponse>> {
        let notifications = sqlx::query_as::<_, NotificationDBResponse>(
            "SELECT * FROM notifications WHERE staff_id = $1 AND NOT is_read ORDER BY created_at DESC, id DESC",
        )
        .bind(staff_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(notifications)
    }

    /// Returns how many notifications changed
    #[instrument(skip(self), err)]
    pub async fn mark_all_read(&mut self, staff_id: StaffId) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE staff_id = $1 AND NOT is_read")
            .bind(staff_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_staff;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_unread_listing_and_mark_all(pool: PgPool) {
        let staff = create_test_staff(&pool, "Nia", &[]).await;
        let other = create_test_staff(&pool, "Oli", &[]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Notifications::new(&mut conn);
        for (staff_id, message) in [(staff.id, "first"), (staff.id, "second"), (other.id, "elsewhere")] {
            repo.create(&NotificationCreateDBRequest {
                staff_id,
                message: message.to_string(),
                target_type: Some("Conversation".to_string()),
                target_id: Some(1),
                target_link: Some("/admin/messaging".to_string()),
            })
            .await
            .unwrap();
        }

        let unread = repo.list_unread(staff.id).await.unwrap();
        assert_eq!(unread.iter().map(|n| n.message.as_str()).collect::<Vec<_>>(), ["second", "first"]);

        assert_eq!(repo.mark_all_read(staff.id).await.unwrap(), 2);
        assert_eq!(repo.mark_all_read(staff.id).await.unwrap(), 0);
        assert!(repo.list_unread(staff.id).await.unwrap().is_empty());
        assert_eq!(repo.list_unread(other.id).await.unwrap().len(), 1);
    }
}
