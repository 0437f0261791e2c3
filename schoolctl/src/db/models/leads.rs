//! Database models for admissions leads.

use crate::types::LeadId;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Status a lead has before anyone has touched it
pub const DEFAULT_LEAD_STATUS: &str = "Waitlisted";
/// Status set once the lead has been converted into a student
pub const ENROLLED_LEAD_STATUS: &str = "Enrolled";

/// Student details submitted with an application
#[derive(Debug, Clone)]
pub struct LeadStudentFields {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub city_state: Option<String>,
    pub grade_level: Option<String>,
}

/// Parent details submitted with an application
#[derive(Debug, Clone)]
pub struct LeadParentFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Database request for creating a lead with its children
#[derive(Debug, Clone)]
pub struct LeadCreateDBRequest {
    pub expected_start_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub policy_agreed: bool,
    pub students: Vec<LeadStudentFields>,
    pub parents: Vec<LeadParentFields>,
}

/// Partial update of one lead student, matched by id
#[derive(Debug, Clone, Default)]
pub struct LeadStudentUpdate {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub city_state: Option<String>,
    pub grade_level: Option<String>,
}

/// Partial update of one lead parent, matched by id
#[derive(Debug, Clone, Default)]
pub struct LeadParentUpdate {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LeadStudentDBResponse {
    pub id: i64,
    pub lead_id: LeadId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub city_state: Option<String>,
    pub grade_level: Option<String>,
}

impl LeadStudentDBResponse {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LeadParentDBResponse {
    pub id: i64,
    pub lead_id: LeadId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Database response for a lead, children included
#[derive(Debug, Clone)]
pub struct LeadDBResponse {
    pub id: LeadId,
    pub secure_token: String,
    pub status: String,
    pub payment_status: String,
    pub expected_start_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub policy_agreed: bool,
    pub internal_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub students: Vec<LeadStudentDBResponse>,
    pub parents: Vec<LeadParentDBResponse>,
}

impl LeadDBResponse {
    /// Full name of the first student on the application, if any
    pub fn primary_student_name(&self) -> Option<String> {
        self.students.first().map(LeadStudentDBResponse::full_name)
    }
}
