//! Database repository for subsidy programs.

use crate::db::{
    errors::Result,
    models::subsidies::{SubsidyCreateDBRequest, SubsidyDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Subsidies<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subsidies<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &SubsidyCreateDBRequest) -> Result<SubsidyDBResponse> {
        let subsidy = sqlx::query_as::<_, SubsidyDBResponse>("INSERT INTO subsidies (name) VALUES ($1) RETURNING *")
            .bind(&request.name)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(subsidy)
    }

    /// All subsidies ordered by name
    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<SubsidyDBResponse>> {
        let subsidies = sqlx::query_as::<_, SubsidyDBResponse>("SELECT * FROM subsidies ORDER BY name")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(subsidies)
    }
}
