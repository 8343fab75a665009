use serde::{Deserialize, Serialize};

/// Body of the batch bind endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceBatchBindRequest {
    /// Optional; when present it must name the application in the path
    pub app_name: String,
    pub service_names: Vec<String>,
}

/// Body of the legacy single bind endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceBindRequest {
    pub app_name: String,
}

/// Query string of `GET /maintenance/cleanup-stale-caches`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanupQuery {
    pub stale_days: Option<String>,
    pub check_app_exists: Option<String>,
    pub dry_run: Option<String>,
}

/// Empty success body, serialised as `{}`
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyResponse {}
