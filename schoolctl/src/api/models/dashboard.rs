//! API response models for the dashboards and the caller's profile.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{activity::ActivityLogResponse, leads::LeadResponse};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardOverview {
    pub total_staff: i64,
    pub total_students: i64,
    pub total_departments: i64,
    pub total_leads: i64,
    pub recent_leads: Vec<LeadResponse>,
    pub recent_activities: Vec<ActivityLogResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountingOverview {
    #[schema(value_type = String)]
    pub total_revenue: Decimal,
    pub pending_invoices: i64,
    pub overdue_payments: i64,
    #[schema(value_type = String)]
    pub total_expenses: Decimal,
}

/// Counters for modules that are not tracked yet report zero
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdministrationOverview {
    pub total_staff_onboarded: i64,
    pub upcoming_events: i64,
    pub facility_requests: i64,
    pub open_support_tickets: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
    /// `Super Admin` or `Staff`
    pub role: String,
    pub departments: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}
