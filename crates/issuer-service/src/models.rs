//! Request and response bodies for the HTTP API

use chrono::{DateTime, Utc};
use passmint_common::PassStats;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Request to create a design from JSON
#[derive(Debug, Deserialize)]
pub struct CreateDesignRequest {
    /// Template document; must be a JSON object
    pub template_json: Value,

    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Request to issue a pass
#[derive(Debug, Deserialize)]
pub struct CreatePassRequest {
    pub design_id: Uuid,

    /// Extra display fields merged into every platform artifact
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Request to update an issued pass
#[derive(Debug, Deserialize)]
pub struct PassUpdateRequest {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct Activity {
    pub timestamp: DateTime<Utc>,
}

/// Aggregate pass statistics for an organization
#[derive(Debug, Serialize)]
pub struct OrgStatsResponse {
    pub org_id: Uuid,
    pub passes: PassStats,
    pub recent_activity: Vec<Activity>,
    pub updated_at: DateTime<Utc>,
}
