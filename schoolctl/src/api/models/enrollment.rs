//! API request/response models for enrollment forms and submissions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::enrollment::{EnrollmentFormDBResponse, EnrollmentFormUpdateDBRequest, SubmissionDBResponse};
use crate::db::models::leads::LeadDBResponse;
use crate::types::{FormId, LeadId, SubmissionId};

/// Shown wherever a lead has no student on file
pub const UNNAMED_STUDENT: &str = "N/A";

/// New form; everything is optional and falls back to an untitled draft
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EnrollmentFormCreate {
    pub name: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub form_structure_json: Option<serde_json::Value>,
    pub collect_fee: Option<bool>,
    #[schema(value_type = Option<String>)]
    pub fee_amount: Option<Decimal>,
    pub recipient_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EnrollmentFormUpdate {
    pub name: Option<String>,
    pub status: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub form_structure_json: Option<serde_json::Value>,
    pub collect_fee: Option<bool>,
    #[schema(value_type = Option<String>)]
    pub fee_amount: Option<Decimal>,
    pub recipient_type: Option<String>,
}

impl From<EnrollmentFormUpdate> for EnrollmentFormUpdateDBRequest {
    fn from(api: EnrollmentFormUpdate) -> Self {
        Self {
            name: api.name,
            status: api.status,
            form_structure_json: api.form_structure_json,
            collect_fee: api.collect_fee,
            fee_amount: api.fee_amount,
            recipient_type: api.recipient_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentFormResponse {
    pub id: FormId,
    pub name: String,
    pub status: String,
    #[schema(value_type = Object)]
    pub form_structure_json: serde_json::Value,
    pub collect_fee: bool,
    #[schema(value_type = Option<String>)]
    pub fee_amount: Option<Decimal>,
    pub recipient_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EnrollmentFormDBResponse> for EnrollmentFormResponse {
    fn from(db: EnrollmentFormDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            status: db.status,
            form_structure_json: db.form_structure_json,
            collect_fee: db.collect_fee,
            fee_amount: db.fee_amount,
            recipient_type: db.recipient_type,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionResponse {
    pub id: SubmissionId,
    pub secure_token: String,
    pub form_id: FormId,
    pub form_name: String,
    pub lead_id: LeadId,
    pub lead_student_name: String,
    pub status: String,
    pub payment_status: String,
    #[schema(value_type = Option<Object>)]
    pub responses_json: Option<serde_json::Value>,
    pub sent_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<SubmissionDBResponse> for SubmissionResponse {
    fn from(db: SubmissionDBResponse) -> Self {
        Self {
            id: db.id,
            secure_token: db.secure_token,
            form_id: db.form_id,
            form_name: db.form_name,
            lead_id: db.lead_id,
            lead_student_name: db.lead_student_name.unwrap_or_else(|| UNNAMED_STUDENT.to_string()),
            status: db.status,
            payment_status: db.payment_status,
            responses_json: db.responses_json,
            sent_at: db.sent_at,
            submitted_at: db.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SendFormRequest {
    pub lead_ids: Vec<LeadId>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RecipientsQuery {
    /// `New Students` (default) or `Returning Students`
    #[serde(rename = "type")]
    pub recipient_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipientResponse {
    pub id: LeadId,
    pub name: String,
    pub status: String,
}

impl From<LeadDBResponse> for RecipientResponse {
    fn from(lead: LeadDBResponse) -> Self {
        Self {
            name: lead.primary_student_name().unwrap_or_else(|| "Unnamed Lead".to_string()),
            id: lead.id,
            status: lead.status,
        }
    }
}

/// What a parent sees when opening their enrollment link
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicSubmissionResponse {
    pub submission_id: SubmissionId,
    #[schema(value_type = Object)]
    pub form_structure: serde_json::Value,
    pub fee_required: bool,
    #[schema(value_type = Option<String>)]
    pub fee_amount: Option<Decimal>,
    pub student_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PublicSubmit {
    #[schema(value_type = Object)]
    pub responses: serde_json::Value,
}
