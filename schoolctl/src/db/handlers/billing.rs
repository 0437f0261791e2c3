//! Database repository for financial accounts, invoices, payments and credits.

use std::collections::HashMap;

use crate::db::{
    errors::Result,
    models::{
        billing::{
            AccountSummaryDBResponse, CreditCreateDBRequest, CreditDBResponse, FinancialAccountDBResponse,
            InvoiceCreateDBRequest, InvoiceDBResponse, InvoiceItemDBResponse, PaymentCreateDBRequest, PaymentDBResponse,
        },
        students::ACTIVE_STUDENT_STATUS,
    },
};
use crate::types::{AccountId, InvoiceId, StudentId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, FromRow)]
struct Invoice {
    id: InvoiceId,
    account_id: AccountId,
    status: String,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

pub struct Billing<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Billing<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn attach_items(&mut self, invoices: Vec<Invoice>) -> Result<Vec<InvoiceDBResponse>> {
        let ids: Vec<InvoiceId> = invoices.iter().map(|i| i.id).collect();
        let items = sqlx::query_as::<_, InvoiceItemDBResponse>(
            "SELECT * FROM invoice_items WHERE invoice_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut items_by_invoice: HashMap<InvoiceId, Vec<InvoiceItemDBResponse>> = HashMap::new();
        for item in items {
            items_by_invoice.entry(item.invoice_id).or_default().push(item);
        }

        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let items = items_by_invoice.remove(&invoice.id).unwrap_or_default();
                InvoiceDBResponse {
                    total: items.iter().map(|i| i.amount).sum(),
                    items,
                    id: invoice.id,
                    account_id: invoice.account_id,
                    status: invoice.status,
                    due_date: invoice.due_date,
                    created_at: invoice.created_at,
                }
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    pub async fn account_for_student(&mut self, student_id: StudentId) -> Result<Option<FinancialAccountDBResponse>> {
        let account = sqlx::query_as::<_, FinancialAccountDBResponse>(
            "SELECT * FROM student_financial_accounts WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(account)
    }

    /// Open an account for every active student that lacks one; returns how many were created
    #[instrument(skip(self), err)]
    pub async fn ensure_accounts_for_active_students(&mut self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO student_financial_accounts (student_id)
            SELECT id FROM students WHERE status = $1
            ON CONFLICT (student_id) DO NOTHING
            "#,
        )
        .bind(ACTIVE_STUDENT_STATUS)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, request), fields(account_id = request.account_id, items = request.items.len()), err)]
    pub async fn create_invoice(&mut self, request: &InvoiceCreateDBRequest) -> Result<InvoiceDBResponse> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "INSERT INTO invoices (account_id, status, due_date) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.account_id)
        .bind(&request.status)
        .bind(request.due_date)
        .fetch_one(&mut *self.db)
        .await?;

        let (descriptions, amounts): (Vec<String>, Vec<Decimal>) =
            request.items.iter().map(|i| (i.description.clone(), i.amount)).unzip();

        let items = sqlx::query_as::<_, InvoiceItemDBResponse>(
            r#"
            INSERT INTO invoice_items (invoice_id, description, amount)
            SELECT $1, * FROM UNNEST($2::text[], $3::numeric[])
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(&descriptions)
        .bind(&amounts)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(InvoiceDBResponse {
            total: items.iter().map(|i| i.amount).sum(),
            items,
            id: invoice.id,
            account_id: invoice.account_id,
            status: invoice.status,
            due_date: invoice.due_date,
            created_at: invoice.created_at,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<InvoiceDBResponse>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match invoice {
            Some(invoice) => Ok(self.attach_items(vec![invoice]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Oldest first
    #[instrument(skip(self), err)]
    pub async fn invoices_for_account(&mut self, account_id: AccountId) -> Result<Vec<InvoiceDBResponse>> {
        let invoices = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE account_id = $1 ORDER BY created_at, id")
            .bind(account_id)
            .fetch_all(&mut *self.db)
            .await?;

        self.attach_items(invoices).await
    }

    #[instrument(skip(self), err)]
    pub async fn set_invoice_status(&mut self, id: InvoiceId, status: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE invoices SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(account_id = request.account_id, amount = %request.amount), err)]
    pub async fn record_payment(&mut self, request: &PaymentCreateDBRequest) -> Result<PaymentDBResponse> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            INSERT INTO payments (account_id, invoice_id, amount, method, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.account_id)
        .bind(request.invoice_id)
        .bind(request.amount)
        .bind(&request.method)
        .bind(&request.notes)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(payment)
    }

    /// Sum of payments applied to one invoice
    #[instrument(skip(self), err)]
    pub async fn invoice_paid_total(&mut self, invoice_id: InvoiceId) -> Result<Decimal> {
        let paid: Decimal = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1")
            .bind(invoice_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(paid)
    }

    /// Oldest first
    #[instrument(skip(self), err)]
    pub async fn payments_for_account(&mut self, account_id: AccountId) -> Result<Vec<PaymentDBResponse>> {
        let payments = sqlx::query_as::<_, PaymentDBResponse>(
            "SELECT * FROM payments WHERE account_id = $1 ORDER BY transaction_date, id",
        )
        .bind(account_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(payments)
    }

    #[instrument(skip(self, request), fields(account_id = request.account_id, amount = %request.amount), err)]
    pub async fn add_credit(&mut self, request: &CreditCreateDBRequest) -> Result<CreditDBResponse> {
        let credit = sqlx::query_as::<_, CreditDBResponse>(
            "INSERT INTO credits (account_id, amount, reason) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.account_id)
        .bind(request.amount)
        .bind(&request.reason)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(credit)
    }

    /// Oldest first
    #[instrument(skip(self), err)]
    pub async fn credits_for_account(&mut self, account_id: AccountId) -> Result<Vec<CreditDBResponse>> {
        let credits = sqlx::query_as::<_, CreditDBResponse>("SELECT * FROM credits WHERE account_id = $1 ORDER BY created_at, id")
            .bind(account_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(credits)
    }

    /// Totals and most recent activity for every active student with an account
    #[instrument(skip(self), err)]
    pub async fn account_summaries(&mut self) -> Result<Vec<AccountSummaryDBResponse>> {
        let summaries = sqlx::query_as::<_, AccountSummaryDBResponse>(
            r#"
            SELECT
                s.id AS student_id,
                s.first_name || ' ' || s.last_name AS student_name,
                COALESCE((
                    SELECT SUM(ii.amount) FROM invoice_items ii
                    JOIN invoices i ON i.id = ii.invoice_id
                    WHERE i.account_id = a.id
                ), 0) AS total_invoiced,
                COALESCE((SELECT SUM(amount) FROM payments WHERE account_id = a.id), 0) AS total_paid,
                COALESCE((SELECT SUM(amount) FROM credits WHERE account_id = a.id), 0) AS total_credited,
                last_invoice.created_at AS last_invoice_date,
                last_invoice.total AS last_invoice_amount,
                last_payment.transaction_date AS last_payment_date,
                last_payment.amount AS last_payment_amount
            FROM students s
            JOIN student_financial_accounts a ON a.student_id = s.id
            LEFT JOIN LATERAL (
                SELECT i.created_at, COALESCE((SELECT SUM(amount) FROM invoice_items WHERE invoice_id = i.id), 0) AS total
                FROM invoices i
                WHERE i.account_id = a.id
                ORDER BY i.created_at DESC, i.id DESC
                LIMIT 1
            ) last_invoice ON TRUE
            LEFT JOIN LATERAL (
                SELECT transaction_date, amount FROM payments
                WHERE account_id = a.id
                ORDER BY transaction_date DESC, id DESC
                LIMIT 1
            ) last_payment ON TRUE
            WHERE s.status = $1
            ORDER BY s.last_name, s.first_name, s.id
            "#,
        )
        .bind(ACTIVE_STUDENT_STATUS)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(summaries)
    }

    /// Sum of every payment ever recorded
    #[instrument(skip(self), err)]
    pub async fn total_revenue(&mut self) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(total)
    }

    #[instrument(skip(self), err)]
    pub async fn count_invoices_with_status(&mut self, status: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE status = $1")
            .bind(status)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Invoices marked Overdue, plus Sent invoices whose due date is before `today`
    #[instrument(skip(self), err)]
    pub async fn count_overdue(&mut self, today: NaiveDate) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE status = 'Overdue' OR (status = 'Sent' AND due_date < $1)",
        )
        .bind(today)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
