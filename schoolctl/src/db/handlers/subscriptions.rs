//! Database repository for billing plan templates and recurring subscriptions.

use crate::db::{
    errors::Result,
    models::billing::{
        ACTIVE_SUBSCRIPTION_STATUS, BillingPlanCreateDBRequest, BillingPlanDBResponse, SubscriptionCreateDBRequest,
        SubscriptionDBResponse,
    },
};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;

const SELECT_SUBSCRIPTIONS: &str = r#"
    SELECT
        sub.*,
        s.id AS student_id,
        s.first_name || ' ' || s.last_name AS student_name,
        parent.email AS parent_email,
        parent.name AS parent_name
    FROM subscriptions sub
    JOIN student_financial_accounts a ON a.id = sub.account_id
    JOIN students s ON s.id = a.student_id
    LEFT JOIN LATERAL (
        SELECT p.email, p.first_name || ' ' || p.last_name AS name
        FROM student_parents sp
        JOIN parents p ON p.id = sp.parent_id
        WHERE sp.student_id = s.id
        ORDER BY p.id
        LIMIT 1
    ) parent ON TRUE
"#;

pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create_plan(&mut self, request: &BillingPlanCreateDBRequest) -> Result<BillingPlanDBResponse> {
        let plan = sqlx::query_as::<_, BillingPlanDBResponse>(
            "INSERT INTO billing_plans (name, items_json) VALUES ($1, $2) RETURNING *",
        )
        .bind(&request.name)
        .bind(&request.items_json)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(plan)
    }

    /// Active plan templates ordered by name
    #[instrument(skip(self), err)]
    pub async fn list_plans(&mut self) -> Result<Vec<BillingPlanDBResponse>> {
        let plans = sqlx::query_as::<_, BillingPlanDBResponse>("SELECT * FROM billing_plans WHERE is_active ORDER BY name")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(plans)
    }

    #[instrument(skip(self, request), fields(account_id = request.account_id, plan = %request.plan_name), err)]
    pub async fn create(&mut self, request: &SubscriptionCreateDBRequest) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (
                account_id, plan_name, cycle, start_date, end_date,
                invoice_generation_day, due_day, next_invoice_date, items_json
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(request.account_id)
        .bind(&request.plan_name)
        .bind(&request.cycle)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.invoice_generation_day)
        .bind(request.due_day)
        .bind(request.next_invoice_date)
        .bind(&request.items_json)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(id)
    }

    #[instrument(skip(self), err)]
    pub async fn list_active(&mut self) -> Result<Vec<SubscriptionDBResponse>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            "{SELECT_SUBSCRIPTIONS} WHERE sub.status = $1 ORDER BY sub.next_invoice_date, sub.id"
        ))
        .bind(ACTIVE_SUBSCRIPTION_STATUS)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(subscriptions)
    }

    /// Active subscriptions whose next invoice date has arrived and whose end date hasn't passed.
    ///
    /// Rows are locked so that concurrent passes don't invoice the same period twice.
    #[instrument(skip(self), err)]
    pub async fn due(&mut self, today: NaiveDate) -> Result<Vec<SubscriptionDBResponse>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            r#"
            {SELECT_SUBSCRIPTIONS}
            WHERE sub.status = $1
              AND sub.next_invoice_date <= $2
              AND (sub.end_date IS NULL OR sub.end_date >= $2)
            ORDER BY sub.id
            FOR UPDATE OF sub SKIP LOCKED
            "#
        ))
        .bind(ACTIVE_SUBSCRIPTION_STATUS)
        .bind(today)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(subscriptions)
    }

    #[instrument(skip(self), err)]
    pub async fn set_next_invoice_date(&mut self, id: i64, next_invoice_date: NaiveDate) -> Result<bool> {
        let result = sqlx::query("UPDATE subscriptions SET next_invoice_date = $2 WHERE id = $1")
            .bind(id)
            .bind(next_invoice_date)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    pub async fn set_status(&mut self, id: i64, status: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE subscriptions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
