//! Database models for enrolled students and parents.

use crate::types::{LeadId, ParentId, StudentId};
use chrono::NaiveDate;
use sqlx::FromRow;

pub const ACTIVE_STUDENT_STATUS: &str = "Active";

#[derive(Debug, Clone, FromRow)]
pub struct ParentDBResponse {
    pub id: ParentId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Database response for a student with linked parents
#[derive(Debug, Clone)]
pub struct StudentDBResponse {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub grade_level: Option<String>,
    pub enrollment_date: NaiveDate,
    pub status: String,
    pub lead_id: Option<LeadId>,
    pub parents: Vec<ParentDBResponse>,
}

impl StudentDBResponse {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Outcome of converting a lead into a student
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub student_id: StudentId,
    pub student_name: String,
}
