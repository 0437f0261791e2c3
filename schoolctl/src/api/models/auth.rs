//! API request/response models for authentication and the super admin bootstrap.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::{staff::StaffDBResponse, super_admins::SuperAdminDBResponse};
use crate::types::{ActorType, ParticipantRef, Role};

/// The authenticated principal, as carried in the session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: i64,
    pub role: Role,
    pub email: String,
    pub name: String,
    pub department_names: Vec<String>,
    pub dashboard_routes: Vec<String>,
}

impl CurrentUser {
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Messaging identity of this principal
    pub fn participant(&self) -> ParticipantRef {
        match self.role {
            Role::Staff => ParticipantRef::Staff(self.id),
            Role::SuperAdmin => ParticipantRef::SuperAdmin(self.id),
        }
    }

    pub fn actor_type(&self) -> ActorType {
        ActorType::from(self.role)
    }

    /// Staff id of the caller, if the caller is staff
    pub fn staff_id(&self) -> Option<i64> {
        (self.role == Role::Staff).then_some(self.id)
    }
}

impl From<&StaffDBResponse> for CurrentUser {
    fn from(staff: &StaffDBResponse) -> Self {
        Self {
            id: staff.id,
            role: Role::Staff,
            email: staff.email.clone(),
            name: staff.name.clone(),
            department_names: staff.department_names.clone(),
            dashboard_routes: staff.dashboard_routes.clone(),
        }
    }
}

impl From<&SuperAdminDBResponse> for CurrentUser {
    fn from(admin: &SuperAdminDBResponse) -> Self {
        Self {
            id: admin.id,
            role: Role::SuperAdmin,
            email: admin.email.clone(),
            name: admin.name.clone(),
            department_names: Vec::new(),
            dashboard_routes: Vec::new(),
        }
    }
}

/// Login request; both fields are required
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Plain `{message}` body used by several endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuperAdminCheckResponse {
    pub super_admin_exists: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SuperAdminRegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SuperAdminVerifyRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuperAdminProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<SuperAdminDBResponse> for SuperAdminProfile {
    fn from(db: SuperAdminDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
        }
    }
}

/// A required string field: present and not blank
pub fn required<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
