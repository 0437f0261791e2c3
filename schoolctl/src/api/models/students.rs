//! API request/response models for enrolled students.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::students::{ParentDBResponse, StudentDBResponse};
use crate::types::{LeadId, ParentId, StudentId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParentResponse {
    pub id: ParentId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<ParentDBResponse> for ParentResponse {
    fn from(db: ParentDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            phone: db.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub grade_level: Option<String>,
    pub enrollment_date: NaiveDate,
    pub status: String,
    pub lead_id: Option<LeadId>,
    pub parents: Vec<ParentResponse>,
}

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            date_of_birth: db.date_of_birth,
            grade_level: db.grade_level,
            enrollment_date: db.enrollment_date,
            status: db.status,
            lead_id: db.lead_id,
            parents: db.parents.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversionResponse {
    pub message: String,
    pub student_id: StudentId,
}
