use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::cache::CleanupParams;
use crate::model::ObjectRef;
use crate::services::ServiceUpdate;

use super::error::ApiError;
use super::models::{CleanupQuery, EmptyResponse, ServiceBatchBindRequest, ServiceBindRequest};
use super::state::ApiState;

/// Decode a JSON body; a malformed body is the caller's fault
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("malformed request body: {}", e)))
}

fn parse_flag(name: &str, value: Option<&str>) -> Result<Option<bool>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(v) => Err(ApiError::bad_request(format!("invalid {}: {}", name, v))),
    }
}

pub async fn batch_bind(
    State(state): State<ApiState>,
    Path((namespace, app)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ServiceBatchBindRequest = parse_body(&body)?;
    if !request.app_name.is_empty() && request.app_name != app {
        return Err(ApiError::bad_request(format!(
            "app_name {} does not match application {}",
            request.app_name, app
        )));
    }

    let app = ObjectRef::new(namespace, app);
    state
        .plane
        .binder
        .batch_bind(&app, &request.service_names, true)
        .await?;
    Ok(Json(EmptyResponse {}))
}

pub async fn bind_service(
    State(state): State<ApiState>,
    Path((namespace, service)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ServiceBindRequest = parse_body(&body)?;
    if request.app_name.trim().is_empty() {
        return Err(ApiError::bad_request("app_name must not be empty"));
    }

    let app = ObjectRef::new(namespace, request.app_name);
    state.plane.binder.bind_service(&app, &service, true).await?;
    Ok(Json(EmptyResponse {}))
}

pub async fn unbind_service(
    State(state): State<ApiState>,
    Path((namespace, service, app)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let app = ObjectRef::new(namespace, app);
    let report = state.plane.binder.unbind(&app, &service, true).await?;
    Ok(Json(report))
}

pub async fn update_service(
    State(state): State<ApiState>,
    Path((namespace, service)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let update: ServiceUpdate = parse_body(&body)?;
    let report = state
        .plane
        .services
        .update(&namespace, &service, &update)
        .await?;
    Ok(Json(report))
}

pub async fn show_app(
    State(state): State<ApiState>,
    Path((namespace, app)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .plane
        .app_details(&ObjectRef::new(namespace, app))
        .await?;
    Ok(Json(details))
}

pub async fn stage_app(
    State(state): State<ApiState>,
    Path((namespace, app)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .plane
        .reconciler
        .reconcile(&ObjectRef::new(namespace, app))
        .await?;
    Ok(Json(report))
}

pub async fn cleanup_stale_caches(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let params: CleanupParams = parse_body(&body)?;
    let report = state
        .plane
        .collector
        .cleanup_with(&params, &state.plane.cleanup_defaults)
        .await?;
    Ok(Json(report))
}

pub async fn cleanup_stale_caches_query(
    State(state): State<ApiState>,
    Query(query): Query<CleanupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let params = CleanupParams {
        stale_days: query
            .stale_days
            .filter(|s| !s.trim().is_empty())
            .map(serde_json::Value::String),
        check_app_exists: parse_flag("checkAppExists", query.check_app_exists.as_deref())?,
        dry_run: parse_flag("dryRun", query.dry_run.as_deref())?,
    };
    let report = state
        .plane
        .collector
        .cleanup_with(&params, &state.plane.cleanup_defaults)
        .await?;
    Ok(Json(report))
}
