//! API request/response models for billing, plus the per-student ledger.
//!
//! The ledger merges invoices (charges), payments and credits into one timeline. The running
//! balance is accumulated oldest first and the rows are then returned newest first.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::billing::{
    AccountSummaryDBResponse, BillingPlanDBResponse, CreditDBResponse, InvoiceDBResponse, PaymentDBResponse, PresetItemDBResponse,
    SubscriptionDBResponse,
};
use crate::invoicing::plan_total;
use crate::types::{AccountId, InvoiceId, StudentId};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PresetItemCreate {
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PresetItemUpdate {
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresetItemResponse {
    pub id: i64,
    pub description: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub is_active: bool,
}

impl From<PresetItemDBResponse> for PresetItemResponse {
    fn from(db: PresetItemDBResponse) -> Self {
        Self {
            id: db.id,
            description: db.description,
            amount: db.amount,
            is_active: db.is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct InvoiceItemInput {
    pub description: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct InvoiceCreate {
    pub items: Vec<InvoiceItemInput>,
    pub due_date: Option<NaiveDate>,
    /// Defaults to `Draft`
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceItemResponse {
    pub id: i64,
    pub description: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<InvoiceItemResponse>,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
}

impl From<InvoiceDBResponse> for InvoiceResponse {
    fn from(db: InvoiceDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            status: db.status,
            due_date: db.due_date,
            created_at: db.created_at,
            items: db
                .items
                .into_iter()
                .map(|i| InvoiceItemResponse {
                    id: i.id,
                    description: i.description,
                    amount: i.amount,
                })
                .collect(),
            total_amount: db.total,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PaymentCreate {
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    /// Defaults to `Cash`
    pub method: Option<String>,
    pub notes: Option<String>,
    pub invoice_id: Option<InvoiceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub invoice_id: Option<InvoiceId>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub method: String,
    pub notes: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

impl From<PaymentDBResponse> for PaymentResponse {
    fn from(db: PaymentDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            invoice_id: db.invoice_id,
            amount: db.amount,
            method: db.method,
            notes: db.notes,
            transaction_date: db.transaction_date,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreditCreate {
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditResponse {
    pub id: i64,
    pub account_id: AccountId,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreditDBResponse> for CreditResponse {
    fn from(db: CreditDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            amount: db.amount,
            reason: db.reason,
            created_at: db.created_at,
        }
    }
}

/// One row of the accounts listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountSummaryResponse {
    pub student_id: StudentId,
    pub student_name: String,
    #[schema(value_type = String)]
    pub open_balance: Decimal,
    pub last_invoice_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub last_invoice_amount: Option<Decimal>,
    pub last_payment_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub last_payment_amount: Option<Decimal>,
}

impl From<AccountSummaryDBResponse> for AccountSummaryResponse {
    fn from(db: AccountSummaryDBResponse) -> Self {
        Self {
            student_id: db.student_id,
            student_name: db.student_name,
            open_balance: db.total_invoiced - (db.total_paid + db.total_credited),
            last_invoice_date: db.last_invoice_date,
            last_invoice_amount: db.last_invoice_amount,
            last_payment_date: db.last_payment_date,
            last_payment_amount: db.last_payment_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LedgerEntryType {
    Invoice,
    Payment,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub date: DateTime<Utc>,
    pub description: String,
    /// Charges are positive, payments and credits negative
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub status: String,
    /// Balance after this entry
    #[schema(value_type = String)]
    pub balance: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerSummary {
    #[schema(value_type = String)]
    pub paid: Decimal,
    #[schema(value_type = String)]
    pub credited: Decimal,
    #[schema(value_type = String)]
    pub unpaid: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerResponse {
    /// Newest first
    pub transactions: Vec<LedgerEntry>,
    pub summary: LedgerSummary,
    pub student_name: String,
}

/// Build a ledger from an account's invoices, payments and credits
pub fn build_ledger(invoices: &[InvoiceDBResponse], payments: &[PaymentDBResponse], credits: &[CreditDBResponse]) -> (Vec<LedgerEntry>, LedgerSummary) {
    let mut entries: Vec<LedgerEntry> = Vec::with_capacity(invoices.len() + payments.len() + credits.len());

    entries.extend(invoices.iter().map(|invoice| LedgerEntry {
        entry_type: LedgerEntryType::Invoice,
        date: invoice.created_at,
        description: invoice.items.iter().map(|i| i.description.as_str()).collect::<Vec<_>>().join(", "),
        amount: invoice.total,
        status: invoice.status.clone(),
        balance: Decimal::ZERO,
    }));
    entries.extend(payments.iter().map(|payment| LedgerEntry {
        entry_type: LedgerEntryType::Payment,
        date: payment.transaction_date,
        description: format!("Payment via {}", payment.method),
        amount: -payment.amount,
        status: "Success".to_string(),
        balance: Decimal::ZERO,
    }));
    entries.extend(credits.iter().map(|credit| LedgerEntry {
        entry_type: LedgerEntryType::Credit,
        date: credit.created_at,
        description: credit.reason.clone(),
        amount: -credit.amount,
        status: "Applied".to_string(),
        balance: Decimal::ZERO,
    }));

    // Stable sort keeps invoice, payment, credit order for identical timestamps
    entries.sort_by_key(|e| e.date);
    let mut balance = Decimal::ZERO;
    for entry in &mut entries {
        balance += entry.amount;
        entry.balance = balance;
    }
    entries.reverse();

    let invoiced: Decimal = invoices.iter().map(|i| i.total).sum();
    let paid: Decimal = payments.iter().map(|p| p.amount).sum();
    let credited: Decimal = credits.iter().map(|c| c.amount).sum();
    let summary = LedgerSummary {
        paid,
        credited,
        unpaid: invoiced - (paid + credited),
    };

    (entries, summary)
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct BillingPlanCreate {
    pub name: Option<String>,
    /// List of `{description, amount}` items
    #[schema(value_type = Option<Object>)]
    pub items_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillingPlanResponse {
    pub id: i64,
    pub name: String,
    #[schema(value_type = Object)]
    pub items_json: serde_json::Value,
    pub is_active: bool,
}

impl From<BillingPlanDBResponse> for BillingPlanResponse {
    fn from(db: BillingPlanDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            items_json: db.items_json,
            is_active: db.is_active,
        }
    }
}

/// Schedule applied to every selected student
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PlanData {
    pub plan_name: Option<String>,
    /// `Monthly`, or anything else for a one-off
    pub cycle: Option<String>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub invoice_generation_day: Option<u32>,
    pub due_day: Option<u32>,
    #[schema(value_type = Option<Object>)]
    pub items_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SubscriptionCreate {
    pub student_ids: Vec<StudentId>,
    pub plan_data: Option<PlanData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionsCreated {
    pub message: String,
    pub created: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub account_id: AccountId,
    pub student_id: StudentId,
    pub student_name: String,
    pub plan_name: String,
    pub status: String,
    pub cycle: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub invoice_generation_day: i32,
    pub due_day: i32,
    pub next_invoice_date: NaiveDate,
    #[schema(value_type = Object)]
    pub items_json: serde_json::Value,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
}

impl From<SubscriptionDBResponse> for SubscriptionResponse {
    fn from(db: SubscriptionDBResponse) -> Self {
        Self {
            total_amount: plan_total(&db.items_json),
            id: db.id,
            account_id: db.account_id,
            student_id: db.student_id,
            student_name: db.student_name,
            plan_name: db.plan_name,
            status: db.status,
            cycle: db.cycle,
            start_date: db.start_date,
            end_date: db.end_date,
            invoice_generation_day: db.invoice_generation_day,
            due_day: db.due_day,
            next_invoice_date: db.next_invoice_date,
            items_json: db.items_json,
        }
    }
}

/// Parse `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp
pub fn parse_plan_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|t| t.with_timezone(&Utc).date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::billing::InvoiceItemDBResponse;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    fn invoice(id: i64, day: u32, items: &[(&str, i64)]) -> InvoiceDBResponse {
        let items: Vec<InvoiceItemDBResponse> = items
            .iter()
            .enumerate()
            .map(|(n, (description, cents))| InvoiceItemDBResponse {
                id: n as i64,
                invoice_id: id,
                description: description.to_string(),
                amount: Decimal::new(*cents, 2),
            })
            .collect();
        InvoiceDBResponse {
            id,
            account_id: 1,
            status: "Sent".to_string(),
            due_date: None,
            created_at: at(day),
            total: items.iter().map(|i| i.amount).sum(),
            items,
        }
    }

    #[test]
    fn test_ledger_running_balance_newest_first() {
        let invoices = vec![invoice(1, 1, &[("Tuition", 100000), ("Lunch", 5000)])];
        let payments = vec![PaymentDBResponse {
            id: 1,
            account_id: 1,
            invoice_id: Some(1),
            amount: Decimal::new(40000, 2),
            method: "Card".to_string(),
            notes: None,
            transaction_date: at(5),
        }];
        let credits = vec![CreditDBResponse {
            id: 1,
            account_id: 1,
            amount: Decimal::new(5000, 2),
            reason: "Sibling discount".to_string(),
            created_at: at(3),
        }];

        let (entries, summary) = build_ledger(&invoices, &payments, &credits);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].entry_type, LedgerEntryType::Payment);
        assert_eq!(entries[0].description, "Payment via Card");
        assert_eq!(entries[0].amount, Decimal::new(-40000, 2));
        assert_eq!(entries[0].balance, Decimal::new(60000, 2));

        assert_eq!(entries[1].entry_type, LedgerEntryType::Credit);
        assert_eq!(entries[1].status, "Applied");
        assert_eq!(entries[1].balance, Decimal::new(100000, 2));

        assert_eq!(entries[2].description, "Tuition, Lunch");
        assert_eq!(entries[2].amount, Decimal::new(105000, 2));
        assert_eq!(entries[2].balance, Decimal::new(105000, 2));

        assert_eq!(
            summary,
            LedgerSummary {
                paid: Decimal::new(40000, 2),
                credited: Decimal::new(5000, 2),
                unpaid: Decimal::new(60000, 2),
            }
        );
    }

    #[test]
    fn test_empty_ledger() {
        let (entries, summary) = build_ledger(&[], &[], &[]);
        assert!(entries.is_empty());
        assert_eq!(summary, LedgerSummary::default());
    }

    #[test]
    fn test_ledger_balance_is_final_balance() {
        let invoices = vec![invoice(1, 1, &[("A", 1000)]), invoice(2, 2, &[("B", 2500)])];
        let mut payment_date = at(2);
        payment_date += Duration::hours(1);
        let payments = vec![PaymentDBResponse {
            id: 1,
            account_id: 1,
            invoice_id: None,
            amount: Decimal::new(500, 2),
            method: "Cash".to_string(),
            notes: None,
            transaction_date: payment_date,
        }];

        let (entries, summary) = build_ledger(&invoices, &payments, &[]);
        assert_eq!(entries[0].balance, summary.unpaid);
        assert_eq!(summary.unpaid, Decimal::new(3000, 2));
    }

    #[test]
    fn test_parse_plan_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 9, 1);
        assert_eq!(parse_plan_date("2025-09-01"), expected);
        assert_eq!(parse_plan_date("2025-09-01T00:00:00.000Z"), expected);
        assert_eq!(parse_plan_date("September"), None);
    }
}
