//! Database models for the activity log.

use crate::types::ActorType;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A new audit entry
#[derive(Debug, Clone)]
pub struct ActivityLogCreateDBRequest {
    pub actor_id: Option<i64>,
    pub actor_type: ActorType,
    pub actor_name: String,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub target_name: Option<String>,
}

impl ActivityLogCreateDBRequest {
    /// Entry for an action taken by a signed-in principal
    pub fn by(actor_id: i64, actor_type: ActorType, actor_name: &str, action: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id),
            actor_type,
            actor_name: actor_name.to_string(),
            action: action.into(),
            target_type: None,
            target_id: None,
            target_name: None,
        }
    }

    /// Entry for an action taken through a public endpoint
    pub fn system(action: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            actor_type: ActorType::System,
            actor_name: "System".to_string(),
            action: action.into(),
            target_type: None,
            target_id: None,
            target_name: None,
        }
    }

    pub fn with_target(mut self, target_type: &str, target_id: i64, target_name: impl Into<String>) -> Self {
        self.target_type = Some(target_type.to_string());
        self.target_id = Some(target_id);
        self.target_name = Some(target_name.into());
        self
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityLogDBResponse {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub actor_type: ActorType,
    pub actor_name: String,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub target_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
