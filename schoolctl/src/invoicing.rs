//! Recurring tuition invoices.
//!
//! A pass picks up every active subscription whose `next_invoice_date` has arrived, issues a
//! `Sent` invoice built from the subscription's items, and moves the subscription on. All
//! database writes of a pass share one transaction; parents are emailed once it commits.
//!
//! Day-of-month settings (generation day, due day) are clamped to the length of the month they
//! land in, so a day of 31 means the last day of shorter months.

use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::{
    handlers::{ActivityLogs, Billing, Subscriptions},
    models::{
        activity::ActivityLogCreateDBRequest,
        billing::{COMPLETED_SUBSCRIPTION_STATUS, InvoiceCreateDBRequest, InvoiceItemFields, MONTHLY_CYCLE},
    },
};
use crate::email::EmailService;

/// Status of invoices generated from subscriptions
pub const GENERATED_INVOICE_STATUS: &str = "Sent";
/// Frontend path parents follow from invoice emails
pub const PARENT_BILLING_PATH: &str = "/parent/billing";

/// `day` of the given month, clamped to the month's last day
pub fn clamp_to_month(year: i32, month: u32, day: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    let last_day = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28);
    first.with_day(day.clamp(1, last_day)).unwrap_or(first)
}

/// `day` of the month after `date`'s month
fn next_month_on(date: NaiveDate, day: u32) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    clamp_to_month(next.year(), next.month(), day)
}

/// First invoice date for a subscription starting on `start`: the generation day of the start
/// month, or of the following month when the start is already past it.
pub fn first_invoice_date(start: NaiveDate, generation_day: u32) -> NaiveDate {
    if start.day() > generation_day {
        next_month_on(start, generation_day)
    } else {
        clamp_to_month(start.year(), start.month(), generation_day)
    }
}

/// Due date for an invoice issued on `issued`: the due day of this month, or of next month when
/// that day has already passed.
pub fn due_date(issued: NaiveDate, due_day: u32) -> NaiveDate {
    if issued.day() > due_day {
        next_month_on(issued, due_day)
    } else {
        clamp_to_month(issued.year(), issued.month(), due_day)
    }
}

/// Next invoice date of a monthly subscription
pub fn advance_monthly(current: NaiveDate, generation_day: u32) -> NaiveDate {
    next_month_on(current, generation_day)
}

/// Invoice lines from a plan's `items_json`: a missing description is empty and a missing,
/// empty or unparseable amount is zero. Amounts may be JSON numbers or strings.
pub fn plan_items(items_json: &serde_json::Value) -> Vec<InvoiceItemFields> {
    let Some(items) = items_json.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| {
            let description = item.get("description").and_then(|d| d.as_str()).unwrap_or_default().to_string();
            let amount = match item.get("amount") {
                Some(serde_json::Value::String(s)) => s.trim().parse::<Decimal>().ok(),
                Some(serde_json::Value::Number(n)) => n.to_string().parse::<Decimal>().ok(),
                _ => None,
            }
            .unwrap_or(Decimal::ZERO);
            InvoiceItemFields { description, amount }
        })
        .collect()
}

/// Sum of a plan's item amounts
pub fn plan_total(items_json: &serde_json::Value) -> Decimal {
    plan_items(items_json).iter().map(|i| i.amount).sum()
}

#[derive(Debug)]
struct InvoiceEmail {
    to_email: String,
    to_name: Option<String>,
    student_name: String,
    total: Decimal,
    due_date: NaiveDate,
}

/// What a pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvoicingSummary {
    pub invoices_created: usize,
    pub emails_sent: usize,
}

/// Invoice every subscription due on or before `today`
#[tracing::instrument(skip(pool, email, config))]
pub async fn run_invoicing_pass(
    pool: &PgPool,
    email: &EmailService,
    config: &Config,
    today: NaiveDate,
) -> anyhow::Result<InvoicingSummary> {
    let mut tx = pool.begin().await?;
    let due = Subscriptions::new(&mut tx).due(today).await?;
    tracing::info!(count = due.len(), "Subscriptions due for invoicing");

    let mut summary = InvoicingSummary::default();
    let mut emails = Vec::new();
    for subscription in due {
        let due_on = due_date(today, subscription.due_day.max(1) as u32);
        let invoice = Billing::new(&mut tx)
            .create_invoice(&InvoiceCreateDBRequest {
                account_id: subscription.account_id,
                status: GENERATED_INVOICE_STATUS.to_string(),
                due_date: Some(due_on),
                items: plan_items(&subscription.items_json),
            })
            .await?;

        let mut subscriptions = Subscriptions::new(&mut tx);
        if subscription.cycle == MONTHLY_CYCLE {
            let next = advance_monthly(subscription.next_invoice_date, subscription.invoice_generation_day.max(1) as u32);
            subscriptions.set_next_invoice_date(subscription.id, next).await?;
        } else {
            subscriptions.set_status(subscription.id, COMPLETED_SUBSCRIPTION_STATUS).await?;
        }

        ActivityLogs::new(&mut tx)
            .create(
                &ActivityLogCreateDBRequest::system(format!(
                    "Generated recurring invoice for {}",
                    subscription.student_name
                ))
                .with_target("Student", subscription.student_id, subscription.student_name.clone()),
            )
            .await?;

        summary.invoices_created += 1;
        match subscription.parent_email {
            Some(to_email) => emails.push(InvoiceEmail {
                to_email,
                to_name: subscription.parent_name,
                student_name: subscription.student_name,
                total: invoice.total,
                due_date: due_on,
            }),
            None => tracing::warn!(student_id = subscription.student_id, "No parent email for generated invoice"),
        }
    }

    tx.commit().await?;

    let link = config.frontend_link(PARENT_BILLING_PATH);
    for message in emails {
        match email
            .send_invoice(
                &message.to_email,
                message.to_name.as_deref(),
                &message.student_name,
                message.total,
                message.due_date,
                &link,
            )
            .await
        {
            Ok(()) => summary.emails_sent += 1,
            Err(e) => tracing::warn!(to = %message.to_email, "Failed to send invoice email: {}", e),
        }
    }

    tracing::info!(
        invoices = summary.invoices_created,
        emails = summary.emails_sent,
        "Invoicing pass complete"
    );
    Ok(summary)
}

/// Run a pass every `interval` until shutdown
pub async fn run_invoicing_loop(pool: PgPool, email: Arc<EmailService>, config: Config, shutdown: CancellationToken) {
    let interval = config.background_services.invoicing.interval;
    tracing::info!(interval = ?interval, "Starting recurring invoice scheduler");

    loop {
        if let Err(e) = run_invoicing_pass(&pool, &email, &config, Utc::now().date_naive()).await {
            tracing::error!("Recurring invoice pass failed: {:#}", e);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Recurring invoice scheduler shutting down");
                return;
            }
        }
    }
}
