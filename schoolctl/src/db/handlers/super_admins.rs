//! Database repository for the super admin and pending super admin registrations.

use crate::db::{
    errors::Result,
    models::super_admins::{PendingRegistration, SuperAdminCreateDBRequest, SuperAdminDBResponse},
};
use crate::types::SuperAdminId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct SuperAdmins<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SuperAdmins<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn exists(&mut self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM super_admins)")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    /// The super admin, if one has registered
    #[instrument(skip(self), err)]
    pub async fn get(&mut self) -> Result<Option<SuperAdminDBResponse>> {
        let admin = sqlx::query_as::<_, SuperAdminDBResponse>("SELECT * FROM super_admins LIMIT 1")
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(admin)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: SuperAdminId) -> Result<Option<SuperAdminDBResponse>> {
        let admin = sqlx::query_as::<_, SuperAdminDBResponse>("SELECT * FROM super_admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(admin)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<SuperAdminDBResponse>> {
        let admin = sqlx::query_as::<_, SuperAdminDBResponse>("SELECT * FROM super_admins WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(admin)
    }

    /// Fails with a unique violation if a super admin already exists
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &SuperAdminCreateDBRequest) -> Result<SuperAdminDBResponse> {
        let admin = sqlx::query_as::<_, SuperAdminDBResponse>(
            r#"
            INSERT INTO super_admins (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(admin)
    }

    #[instrument(skip(self, password_hash), err)]
    pub async fn update_password(&mut self, id: SuperAdminId, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE super_admins SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Store a registration awaiting verification, replacing any earlier one for the same email
    #[instrument(skip(self, registration), fields(email = %registration.email), err)]
    pub async fn upsert_pending(&mut self, registration: &PendingRegistration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO super_admin_registrations (email, name, password_hash, otp_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                otp_hash = EXCLUDED.otp_hash,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&registration.email)
        .bind(&registration.name)
        .bind(&registration.password_hash)
        .bind(&registration.otp_hash)
        .bind(registration.created_at)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn get_pending(&mut self, email: &str) -> Result<Option<PendingRegistration>> {
        let pending = sqlx::query_as::<_, PendingRegistration>("SELECT * FROM super_admin_registrations WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(pending)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_pending(&mut self, email: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM super_admin_registrations WHERE email = $1")
            .bind(email)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use chrono::Utc;
    use sqlx::PgPool;

    fn admin_request(email: &str) -> SuperAdminCreateDBRequest {
        SuperAdminCreateDBRequest {
            name: "Pat Principal".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_one_super_admin(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = SuperAdmins::new(&mut conn);

        assert!(!repo.exists().await.unwrap());
        let admin = repo.create(&admin_request("principal@school.test")).await.unwrap();
        assert!(repo.exists().await.unwrap());
        assert_eq!(repo.get().await.unwrap().unwrap().id, admin.id);

        let second = repo.create(&admin_request("other@school.test")).await;
        assert!(matches!(second, Err(DbError::UniqueViolation { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pending_registration_is_replaced(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = SuperAdmins::new(&mut conn);

        let mut pending = PendingRegistration {
            email: "principal@school.test".to_string(),
            name: "Pat".to_string(),
            password_hash: "hash".to_string(),
            otp_hash: "first".to_string(),
            created_at: Utc::now(),
        };
        repo.upsert_pending(&pending).await.unwrap();

        pending.otp_hash = "second".to_string();
        repo.upsert_pending(&pending).await.unwrap();

        let stored = repo.get_pending("principal@school.test").await.unwrap().unwrap();
        assert_eq!(stored.otp_hash, "second");

        assert!(repo.delete_pending("principal@school.test").await.unwrap());
        assert!(repo.get_pending("principal@school.test").await.unwrap().is_none());
    }
}
