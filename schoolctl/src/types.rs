//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (StaffId, LeadId, etc.)
//! - The principal kinds that can act on the system
//! - Resource and operation enums for access control
//!
//! # ID Types
//!
//! All entity IDs are `BIGSERIAL` primary keys wrapped in type aliases so that signatures
//! say what they take:
//!
//! - [`StaffId`]: Staff member identifier
//! - [`SuperAdminId`]: Super administrator identifier
//! - [`DepartmentId`]: Department identifier
//! - [`LeadId`]: Admissions lead identifier
//! - [`StudentId`]: Enrolled student identifier
//!
//! # Permission System
//!
//! - [`Resource`]: What entity type is being accessed (Staff, Departments, Leads, etc.)
//! - [`Operation`]: What action is being performed (Read, Create, Update, Delete)
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! The policy itself lives in [`crate::auth::permissions`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

// Type aliases for IDs
pub type StaffId = i64;
pub type SuperAdminId = i64;
pub type DepartmentId = i64;
pub type LeadId = i64;
pub type StudentId = i64;
pub type ParentId = i64;
pub type TaskId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;
pub type NotificationId = i64;
pub type AccountId = i64;
pub type InvoiceId = i64;
pub type FormId = i64;
pub type SubmissionId = i64;

/// The kind of principal holding a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    #[serde(rename = "superadmin")]
    SuperAdmin,
}

impl Role {
    /// Human readable label used by profile and messaging listings
    pub fn label(&self) -> &'static str {
        match self {
            Role::Staff => "Staff",
            Role::SuperAdmin => "Super Admin",
        }
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum ActorType {
    Staff,
    SuperAdmin,
    System,
}

impl From<Role> for ActorType {
    fn from(role: Role) -> Self {
        match role {
            Role::Staff => ActorType::Staff,
            Role::SuperAdmin => ActorType::SuperAdmin,
        }
    }
}

/// A messaging participant reference, encoded on the wire as `staff_{id}` or `superadmin_{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantRef {
    Staff(StaffId),
    SuperAdmin(SuperAdminId),
}

impl ParticipantRef {
    pub fn role(&self) -> Role {
        match self {
            ParticipantRef::Staff(_) => Role::Staff,
            ParticipantRef::SuperAdmin(_) => Role::SuperAdmin,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ParticipantRef::Staff(id) | ParticipantRef::SuperAdmin(id) => *id,
        }
    }
}

impl fmt::Display for ParticipantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantRef::Staff(id) => write!(f, "staff_{id}"),
            ParticipantRef::SuperAdmin(id) => write!(f, "superadmin_{id}"),
        }
    }
}

impl FromStr for ParticipantRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once('_').ok_or_else(|| format!("Invalid participant id: {s}"))?;
        let id: i64 = id.parse().map_err(|_| format!("Invalid participant id: {s}"))?;
        match kind {
            "staff" => Ok(ParticipantRef::Staff(id)),
            "superadmin" => Ok(ParticipantRef::SuperAdmin(id)),
            _ => Err(format!("Invalid participant id: {s}")),
        }
    }
}

// Operations that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    ReadAll,
    UpdateAll,
    DeleteAll,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Staff,
    Departments,
    Leads,
    Students,
    Tasks,
    Billing,
    Enrollment,
    Subsidies,
    ActivityLogs,
    MessageLogs,
    Dashboards,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll => write!(f, "Create"),
            Operation::ReadAll => write!(f, "Read"),
            Operation::UpdateAll => write!(f, "Update"),
            Operation::DeleteAll => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Staff => "staff",
            Resource::Departments => "departments",
            Resource::Leads => "leads",
            Resource::Students => "students",
            Resource::Tasks => "tasks",
            Resource::Billing => "billing",
            Resource::Enrollment => "enrollment",
            Resource::Subsidies => "subsidies",
            Resource::ActivityLogs => "activity logs",
            Resource::MessageLogs => "message logs",
            Resource::Dashboards => "dashboards",
        };
        write!(f, "{name}")
    }
}
