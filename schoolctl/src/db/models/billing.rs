//! Database models for student billing.
//!
//! Every enrolled student has exactly one financial account. Charges are invoices made of
//! line items; payments and credits reduce what is owed. Balances are never stored, they are
//! derived by summing child rows.

use crate::types::{AccountId, InvoiceId, StudentId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

pub const INVOICE_STATUSES: [&str; 5] = ["Draft", "Sent", "Paid", "Overdue", "Void"];
pub const DEFAULT_PAYMENT_METHOD: &str = "Cash";
pub const MONTHLY_CYCLE: &str = "Monthly";
pub const ACTIVE_SUBSCRIPTION_STATUS: &str = "Active";
/// Non-recurring subscriptions end here once their invoice is generated
pub const COMPLETED_SUBSCRIPTION_STATUS: &str = "Completed";

#[derive(Debug, Clone, FromRow)]
pub struct FinancialAccountDBResponse {
    pub id: AccountId,
    pub student_id: StudentId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PresetItemCreateDBRequest {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct PresetItemUpdateDBRequest {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PresetItemDBResponse {
    pub id: i64,
    pub description: String,
    pub amount: Decimal,
    pub is_active: bool,
}

/// One invoice line
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceItemFields {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct InvoiceCreateDBRequest {
    pub account_id: AccountId,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<InvoiceItemFields>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItemDBResponse {
    pub id: i64,
    pub invoice_id: InvoiceId,
    pub description: String,
    pub amount: Decimal,
}

/// Database response for an invoice; `total` is the sum of its items
#[derive(Debug, Clone)]
pub struct InvoiceDBResponse {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<InvoiceItemDBResponse>,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub account_id: AccountId,
    pub invoice_id: Option<InvoiceId>,
    pub amount: Decimal,
    pub method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentDBResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub invoice_id: Option<InvoiceId>,
    pub amount: Decimal,
    pub method: String,
    pub notes: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreditCreateDBRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CreditDBResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Per-student roll-up used by the accounts listing
#[derive(Debug, Clone, FromRow)]
pub struct AccountSummaryDBResponse {
    pub student_id: StudentId,
    pub student_name: String,
    pub total_invoiced: Decimal,
    pub total_paid: Decimal,
    pub total_credited: Decimal,
    pub last_invoice_date: Option<DateTime<Utc>>,
    pub last_invoice_amount: Option<Decimal>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub last_payment_amount: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct BillingPlanCreateDBRequest {
    pub name: String,
    pub items_json: serde_json::Value,
}

#[derive(Debug, Clone, FromRow)]
pub struct BillingPlanDBResponse {
    pub id: i64,
    pub name: String,
    pub items_json: serde_json::Value,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct SubscriptionCreateDBRequest {
    pub account_id: AccountId,
    pub plan_name: String,
    pub cycle: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub invoice_generation_day: i32,
    pub due_day: i32,
    pub next_invoice_date: NaiveDate,
    pub items_json: serde_json::Value,
}

/// A subscription joined with the student it bills
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionDBResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub plan_name: String,
    pub status: String,
    pub cycle: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub invoice_generation_day: i32,
    pub due_day: i32,
    pub next_invoice_date: NaiveDate,
    pub items_json: serde_json::Value,
    pub student_id: StudentId,
    pub student_name: String,
    /// First linked parent, who receives invoice emails
    pub parent_email: Option<String>,
    pub parent_name: Option<String>,
}
