//! Database repository for the activity log.

use crate::db::{
    errors::Result,
    models::activity::{ActivityLogCreateDBRequest, ActivityLogDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct ActivityLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ActivityLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, entry), fields(action = %entry.action), err)]
    pub async fn create(&mut self, entry: &ActivityLogCreateDBRequest) -> Result<ActivityLogDBResponse> {
        let log = sqlx::query_as::<_, ActivityLogDBResponse>(
            r#"
            INSERT INTO activity_logs (actor_id, actor_type, actor_name, action, target_type, target_id, target_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.actor_type)
        .bind(&entry.actor_name)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(entry.target_id)
        .bind(&entry.target_name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    /// Newest first
    #[instrument(skip(self), err)]
    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<ActivityLogDBResponse>> {
        let logs = sqlx::query_as::<_, ActivityLogDBResponse>(
            "SELECT * FROM activity_logs ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_logs")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActorType;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_page_newest_first(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ActivityLogs::new(&mut conn);

        repo.create(&ActivityLogCreateDBRequest::system("Submitted a new admission application").with_target("Lead", 1, "Sam Student"))
            .await
            .unwrap();
        let second = repo
            .create(&ActivityLogCreateDBRequest::by(7, ActorType::Staff, "Terry", "Changed their password"))
            .await
            .unwrap();
        assert_eq!(second.actor_type, ActorType::Staff);
        assert_eq!(second.target_type, None);

        let page = repo.list(0, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, second.id);

        let rest = repo.list(1, 10).await.unwrap();
        assert_eq!(rest[0].actor_type, ActorType::System);
        assert_eq!(rest[0].actor_name, "System");
        assert_eq!(rest[0].target_name.as_deref(), Some("Sam Student"));
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
