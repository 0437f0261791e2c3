//! Database models for enrollment forms and submissions.

use crate::types::{FormId, LeadId, SubmissionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::FromRow;

pub const ACTIVE_FORM_STATUS: &str = "Active";
pub const DRAFT_FORM_STATUS: &str = "Draft";
pub const NEW_STUDENTS_RECIPIENTS: &str = "New Students";
pub const RETURNING_STUDENTS_RECIPIENTS: &str = "Returning Students";

/// Layout every new form starts with: four empty, visible sections
pub fn default_form_structure() -> serde_json::Value {
    let section = |id: &str, title: &str| json!({ "id": id, "title": title, "visible": true, "fields": [] });
    json!({
        "title": "Untitled Enrollment Form",
        "sections": [
            section("student_info", "Student Information"),
            section("parent_info", "Parent/Guardian Information"),
            section("pickup_info", "Authorized Pickup Info"),
            section("policy_waiver", "Policy & Waiver"),
        ]
    })
}

#[derive(Debug, Clone)]
pub struct EnrollmentFormCreateDBRequest {
    pub name: String,
    pub status: String,
    pub form_structure_json: serde_json::Value,
    pub collect_fee: bool,
    pub fee_amount: Option<Decimal>,
    pub recipient_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentFormUpdateDBRequest {
    pub name: Option<String>,
    pub status: Option<String>,
    pub form_structure_json: Option<serde_json::Value>,
    pub collect_fee: Option<bool>,
    pub fee_amount: Option<Decimal>,
    pub recipient_type: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentFormDBResponse {
    pub id: FormId,
    pub name: String,
    pub status: String,
    pub form_structure_json: serde_json::Value,
    pub collect_fee: bool,
    pub fee_amount: Option<Decimal>,
    pub recipient_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A submission joined with its form name and the lead's first student
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionDBResponse {
    pub id: SubmissionId,
    pub secure_token: String,
    pub form_id: FormId,
    pub lead_id: LeadId,
    pub status: String,
    pub payment_status: String,
    pub responses_json: Option<serde_json::Value>,
    pub sent_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub form_name: String,
    pub lead_student_name: Option<String>,
    pub lead_student_first_name: Option<String>,
}

impl SubmissionDBResponse {
    /// Already filled in; the public endpoints refuse further access
    pub fn is_closed(&self) -> bool {
        matches!(self.status.as_str(), "Submitted" | "Completed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_form_structure_has_four_visible_sections() {
        let structure = default_form_structure();
        assert_eq!(structure["title"], "Untitled Enrollment Form");

        let sections = structure["sections"].as_array().unwrap();
        let ids: Vec<_> = sections.iter().map(|s| s["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["student_info", "parent_info", "pickup_info", "policy_waiver"]);
        assert!(sections.iter().all(|s| s["visible"] == true && s["fields"].as_array().unwrap().is_empty()));
    }
}
