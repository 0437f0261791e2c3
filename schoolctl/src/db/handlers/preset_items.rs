//! Database repository for preset charge items.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::billing::{PresetItemCreateDBRequest, PresetItemDBResponse, PresetItemUpdateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct PresetItemFilter {
    pub active_only: bool,
}

pub struct PresetItems<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PresetItems<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for PresetItems<'c> {
    type CreateRequest = PresetItemCreateDBRequest;
    type UpdateRequest = PresetItemUpdateDBRequest;
    type Response = PresetItemDBResponse;
    type Id = i64;
    type Filter = PresetItemFilter;

    #[instrument(skip(self, request), fields(description = %request.description), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, PresetItemDBResponse>(
            "INSERT INTO preset_charge_items (description, amount) VALUES ($1, $2) RETURNING *",
        )
        .bind(&request.description)
        .bind(request.amount)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(item)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let item = sqlx::query_as::<_, PresetItemDBResponse>("SELECT * FROM preset_charge_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(item)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items = sqlx::query_as::<_, PresetItemDBResponse>("SELECT * FROM preset_charge_items WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(items.into_iter().map(|i| (i.id, i)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let items = sqlx::query_as::<_, PresetItemDBResponse>(
            "SELECT * FROM preset_charge_items WHERE (NOT $1 OR is_active) ORDER BY description",
        )
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(items)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM preset_charge_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, PresetItemDBResponse>(
            r#"
            UPDATE preset_charge_items SET
                description = COALESCE($2, description),
                amount = COALESCE($3, amount),
                is_active = COALESCE($4, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.description)
        .bind(request.amount)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(item)
    }
}
