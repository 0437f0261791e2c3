//! API response model for activity log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::activity::ActivityLogDBResponse;
use crate::types::ActorType;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityLogResponse {
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

impl From<ActivityLogDBResponse> for ActivityLogResponse {
    fn from(db: ActivityLogDBResponse) -> Self {
        Self {
            id: db.id,
            actor_id: db.actor_id,
            actor_type: db.actor_type,
            actor_name: db.actor_name,
            action: db.action,
            target_type: db.target_type,
            target_id: db.target_id,
            target_name: db.target_name,
            created_at: db.created_at,
        }
    }
}
