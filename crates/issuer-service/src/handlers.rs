//! API request handlers for designs, passes and statistics

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use passmint_common::{BlobStore, Design, DesignTemplate, Error, IssuedPass};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthOrg, AuthUser};
use crate::issuer::Issuer;
use crate::models::{
    Activity, CreateDesignRequest, CreatePassRequest, OrgStatsResponse, PassUpdateRequest,
};
use crate::store::DesignStore;

/// Application state shared across handlers
pub struct AppState {
    pub issuer: Issuer,

    pub designs: Arc<dyn DesignStore>,

    /// Hosts uploaded design previews
    pub blobs: Arc<dyn BlobStore>,

    /// HS256 secret for bearer tokens
    pub jwt_secret: String,

    /// Local blob directory served at `/files`, when the fs backend is used
    pub files_dir: Option<PathBuf>,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "code": self.code,
            "retryable": self.retryable,
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Error::AllPlatformsFailed(_) => (StatusCode::BAD_GATEWAY, "ALL_PLATFORMS_FAILED"),
            Error::Configuration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            Error::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODING_ERROR"),
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!("Request failed: {}", err);
        }

        ApiError {
            status,
            code,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "issuer-service"
    }))
}

/// Service banner
pub async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "PassMint issuer",
        "version": env!("CARGO_PKG_VERSION"),
        "platforms": state.issuer.platforms(),
    }))
}

/// Create a design from a JSON template
pub async fn create_design_handler(
    State(state): State<Arc<AppState>>,
    AuthOrg(org_id): AuthOrg,
    Json(payload): Json<CreateDesignRequest>,
) -> Result<(StatusCode, Json<Design>), ApiError> {
    let template = DesignTemplate::from_value(payload.template_json)?;
    let design = Design::new(org_id, template, payload.preview_url);

    state.designs.create_design(&design).await?;
    info!("Org {} created design {}", org_id, design.id);

    Ok((StatusCode::CREATED, Json(design)))
}

/// Create a design from a multipart form with an optional preview image
pub async fn upload_design_handler(
    State(state): State<Arc<AppState>>,
    AuthOrg(org_id): AuthOrg,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Design>), ApiError> {
    let mut template_json = None;
    let mut preview = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("template_json") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Unreadable template_json: {}", e))
                })?;
                template_json = Some(text);
            }
            Some("preview_image") => {
                let extension = field
                    .file_name()
                    .and_then(|name| name.rsplit_once('.'))
                    .map(|(_, ext)| ext.to_ascii_lowercase())
                    .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                    .unwrap_or_else(|| "png".to_string());
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Unreadable preview_image: {}", e))
                })?;
                preview = Some((extension, content_type, bytes.to_vec()));
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let raw = template_json.ok_or_else(|| ApiError::bad_request("Missing template_json field"))?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| ApiError::bad_request(format!("template_json is not valid JSON: {}", e)))?;
    let template = DesignTemplate::from_value(value)?;

    let preview_url = match preview {
        Some((extension, content_type, bytes)) => {
            let key = format!("designs/{}.{}", Uuid::new_v4(), extension);
            Some(state.blobs.put(&key, bytes, &content_type).await?)
        }
        None => None,
    };

    let design = Design::new(org_id, template, preview_url);
    state.designs.create_design(&design).await?;
    info!("Org {} uploaded design {}", org_id, design.id);

    Ok((StatusCode::CREATED, Json(design)))
}

/// Fetch a design owned by the caller's organization
pub async fn get_design_handler(
    State(state): State<Arc<AppState>>,
    AuthOrg(org_id): AuthOrg,
    Path(design_id): Path<Uuid>,
) -> Result<Json<Design>, ApiError> {
    state
        .designs
        .get_design(design_id)
        .await?
        .filter(|design| design.org_id == org_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("design not found: {}", design_id)))
}

/// Issue a pass to the calling user
pub async fn create_pass_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePassRequest>,
) -> Result<(StatusCode, Json<IssuedPass>), ApiError> {
    let issued = state
        .issuer
        .issue_pass(user_id, payload.design_id, payload.metadata.as_ref())
        .await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// Fetch one of the caller's passes
pub async fn get_pass_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(pass_id): Path<Uuid>,
) -> Result<Json<IssuedPass>, ApiError> {
    Ok(Json(state.issuer.get_pass(pass_id, user_id).await?))
}

/// Update a pass rendered from one of the caller's designs
pub async fn update_pass_handler(
    State(state): State<Arc<AppState>>,
    AuthOrg(org_id): AuthOrg,
    Path(pass_id): Path<Uuid>,
    Json(payload): Json<PassUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = state
        .issuer
        .update_pass_for_org(pass_id, org_id, &payload.fields)
        .await?;

    if !updated {
        return Err(ApiError::not_found(format!("pass not found: {}", pass_id)));
    }

    Ok(Json(serde_json::json!({ "status": "updated" })))
}

/// Pass statistics for the caller's organization
pub async fn org_stats_handler(
    State(state): State<Arc<AppState>>,
    AuthOrg(caller): AuthOrg,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrgStatsResponse>, ApiError> {
    if caller != org_id {
        return Err(ApiError::forbidden("Statistics are only visible to their organization"));
    }

    let (passes, recent) = state.issuer.org_stats(org_id).await?;

    Ok(Json(OrgStatsResponse {
        org_id,
        passes,
        recent_activity: recent
            .into_iter()
            .map(|timestamp| Activity { timestamp })
            .collect(),
        updated_at: Utc::now(),
    }))
}
