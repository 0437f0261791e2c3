//! API request/response models for admissions leads.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::leads::{
    LeadCreateDBRequest, LeadDBResponse, LeadParentDBResponse, LeadParentFields, LeadParentUpdate, LeadStudentDBResponse,
    LeadStudentFields, LeadStudentUpdate,
};
use crate::types::LeadId;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadStudentInput {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub city_state: Option<String>,
    pub grade_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadParentInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Public admission application
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadCreate {
    pub students: Vec<LeadStudentInput>,
    pub parents: Vec<LeadParentInput>,
    pub policy_agreed: bool,
    pub expected_start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
}

impl LeadCreate {
    /// Why the application cannot be accepted, if anything is missing
    pub fn validation_error(&self) -> Option<&'static str> {
        let blank = |v: &str| v.trim().is_empty();

        if self.students.is_empty() || self.parents.is_empty() || !self.policy_agreed {
            return Some("At least one student and one parent are required, and the policy must be agreed to");
        }
        if self.students.iter().any(|s| blank(&s.first_name) || blank(&s.last_name)) {
            return Some("Every student needs a first and last name");
        }
        if self
            .parents
            .iter()
            .any(|p| blank(&p.first_name) || blank(&p.last_name) || blank(&p.email))
        {
            return Some("Every parent needs a first name, last name and email");
        }
        None
    }
}

impl From<LeadCreate> for LeadCreateDBRequest {
    fn from(api: LeadCreate) -> Self {
        Self {
            expected_start_date: api.expected_start_date,
            amount: api.amount,
            policy_agreed: api.policy_agreed,
            students: api
                .students
                .into_iter()
                .map(|s| LeadStudentFields {
                    first_name: s.first_name,
                    last_name: s.last_name,
                    date_of_birth: s.date_of_birth,
                    city_state: s.city_state,
                    grade_level: s.grade_level,
                })
                .collect(),
            parents: api
                .parents
                .into_iter()
                .map(|p| LeadParentFields {
                    first_name: p.first_name,
                    last_name: p.last_name,
                    email: p.email,
                    phone: p.phone,
                })
                .collect(),
        }
    }
}

/// Status and notes update from the admissions dashboard
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadUpdate {
    pub status: Option<String>,
    pub internal_notes: Option<String>,
}

impl LeadUpdate {
    /// Activity log wording for this update, or None when nothing changes
    pub fn describe(&self) -> Option<String> {
        match (&self.status, &self.internal_notes) {
            (Some(status), Some(_)) => Some(format!("Updated lead status to '{status}' and updated internal notes")),
            (Some(status), None) => Some(format!("Updated lead status to '{status}'")),
            (None, Some(_)) => Some("Updated internal notes".to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadStudentPatch {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub city_state: Option<String>,
    pub grade_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadParentPatch {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Edits to a lead's students and parents, matched by id
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LeadDetailsUpdate {
    pub students: Option<Vec<LeadStudentPatch>>,
    pub parents: Option<Vec<LeadParentPatch>>,
}

impl From<LeadStudentPatch> for LeadStudentUpdate {
    fn from(p: LeadStudentPatch) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name,
            last_name: p.last_name,
            date_of_birth: p.date_of_birth,
            city_state: p.city_state,
            grade_level: p.grade_level,
        }
    }
}

impl From<LeadParentPatch> for LeadParentUpdate {
    fn from(p: LeadParentPatch) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            phone: p.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadStudentResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub city_state: Option<String>,
    pub grade_level: Option<String>,
}

impl From<LeadStudentDBResponse> for LeadStudentResponse {
    fn from(db: LeadStudentDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            date_of_birth: db.date_of_birth,
            city_state: db.city_state,
            grade_level: db.grade_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadParentResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<LeadParentDBResponse> for LeadParentResponse {
    fn from(db: LeadParentDBResponse) -> Self {
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
pub struct LeadResponse {
    pub id: LeadId,
    pub secure_token: String,
    pub status: String,
    pub payment_status: String,
    pub expected_start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub policy_agreed: bool,
    pub internal_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub students: Vec<LeadStudentResponse>,
    pub parents: Vec<LeadParentResponse>,
}

impl From<LeadDBResponse> for LeadResponse {
    fn from(db: LeadDBResponse) -> Self {
        Self {
            id: db.id,
            secure_token: db.secure_token,
            status: db.status,
            payment_status: db.payment_status,
            expected_start_date: db.expected_start_date,
            amount: db.amount,
            policy_agreed: db.policy_agreed,
            internal_notes: db.internal_notes,
            created_at: db.created_at,
            students: db.students.into_iter().map(Into::into).collect(),
            parents: db.parents.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application() -> LeadCreate {
        LeadCreate {
            students: vec![LeadStudentInput {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                ..Default::default()
            }],
            parents: vec![LeadParentInput {
                first_name: "Anne".to_string(),
                last_name: "Lovelace".to_string(),
                email: "anne@family.test".to_string(),
                phone: None,
            }],
            policy_agreed: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_application_requires_names_and_parent_email() {
        assert_eq!(application().validation_error(), None);

        let mut no_policy = application();
        no_policy.policy_agreed = false;
        assert!(no_policy.validation_error().is_some());

        let mut no_last_name = application();
        no_last_name.students[0].last_name = "  ".to_string();
        assert_eq!(
            no_last_name.validation_error(),
            Some("Every student needs a first and last name")
        );

        let mut no_email = application();
        no_email.parents[0].email = String::new();
        assert_eq!(
            no_email.validation_error(),
            Some("Every parent needs a first name, last name and email")
        );
    }

    #[test]
    fn test_lead_update_description() {
        let both = LeadUpdate {
            status: Some("Toured".to_string()),
            internal_notes: Some("called".to_string()),
        };
        assert_eq!(
            both.describe().as_deref(),
            Some("Updated lead status to 'Toured' and updated internal notes")
        );

        let notes = LeadUpdate {
            status: None,
            internal_notes: Some(String::new()),
        };
        assert_eq!(notes.describe().as_deref(), Some("Updated internal notes"));
        assert_eq!(LeadUpdate::default().describe(), None);
    }
}
