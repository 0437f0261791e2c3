//! Database repository for browser push subscriptions.
//!
//! Each staff member and the super admin hold at most one subscription; subscribing again
//! replaces it.

use crate::db::{errors::Result, models::push_subscriptions::PushSubscriptionDBResponse};
use crate::types::ParticipantRef;
use sqlx::PgConnection;
use tracing::instrument;

pub struct PushSubscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PushSubscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, subscription), fields(owner = %owner), err)]
    pub async fn upsert(&mut self, owner: ParticipantRef, subscription: &serde_json::Value) -> Result<PushSubscriptionDBResponse> {
        let sql = match owner {
            ParticipantRef::Staff(_) => {
                r#"
                INSERT INTO push_subscriptions (staff_id, subscription_json) VALUES ($1, $2)
                ON CONFLICT (staff_id) DO UPDATE SET subscription_json = EXCLUDED.subscription_json, created_at = NOW()
                RETURNING *
                "#
            }
            ParticipantRef::SuperAdmin(_) => {
                r#"
                INSERT INTO push_subscriptions (super_admin_id, subscription_json) VALUES ($1, $2)
                ON CONFLICT (super_admin_id) DO UPDATE SET subscription_json = EXCLUDED.subscription_json, created_at = NOW()
                RETURNING *
                "#
            }
        };

        let stored = sqlx::query_as::<_, PushSubscriptionDBResponse>(sql)
            .bind(owner.id())
            .bind(subscription)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(stored)
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn get(&mut self, owner: ParticipantRef) -> Result<Option<PushSubscriptionDBResponse>> {
        let sql = match owner {
            ParticipantRef::Staff(_) => "SELECT * FROM push_subscriptions WHERE staff_id = $1",
            ParticipantRef::SuperAdmin(_) => "SELECT * FROM push_subscriptions WHERE super_admin_id = $1",
        };

        let subscription = sqlx::query_as::<_, PushSubscriptionDBResponse>(sql)
            .bind(owner.id())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(subscription)
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_staff, create_test_superadmin};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_replaces_existing_subscription(pool: PgPool) {
        let staff = create_test_staff(&pool, "Pia", &[]).await;
        let admin = create_test_superadmin(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PushSubscriptions::new(&mut conn);
        let owner = ParticipantRef::Staff(staff.id);

        let first = repo.upsert(owner, &json!({"endpoint": "https://push.test/a"})).await.unwrap();
        let second = repo.upsert(owner, &json!({"endpoint": "https://push.test/b"})).await.unwrap();
        assert_eq!(first.id, second.id);

        repo.upsert(ParticipantRef::SuperAdmin(admin.id), &json!({"endpoint": "https://push.test/admin"}))
            .await
            .unwrap();

        let stored = repo.get(owner).await.unwrap().unwrap();
        assert_eq!(stored.subscription_json["endpoint"], "https://push.test/b");
        assert_eq!(stored.super_admin_id, None);

        assert!(repo.delete(stored.id).await.unwrap());
        assert!(repo.get(owner).await.unwrap().is_none());
        assert!(repo.get(ParticipantRef::SuperAdmin(admin.id)).await.unwrap().is_some());
    }
}
