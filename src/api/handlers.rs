//! API request handlers

use crate::activity::grouping::ActivityGroup;
use crate::api::{ActivityParams, AssetListQuery};
use crate::assets::models::{AssetRef, AssetType, LinkRole, ProfileOrganizationLink, TeamMember};
use crate::assets::projector::UnifiedAsset;
use crate::auth::AuthUser;
use crate::workflows::validation::parse_patch;
use crate::workflows::{AssetManager, BatchCreate, BulkOutcome, BulkUpdate, MutationError};
use crate::AuthConfig;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Shared server state
pub struct ServerState {
    pub manager: Arc<AssetManager>,
    /// Auth config; None means deny-by-default
    pub auth_config: Option<AuthConfig>,
}

pub type DeskState = Arc<ServerState>;

fn parse_asset_type(raw: &str) -> Result<AssetType, AppError> {
    raw.parse().map_err(AppError::BadRequest)
}

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Assets
// ============================================================================

/// List the unified, filtered asset view
pub async fn list_assets(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Query(query): Query<AssetListQuery>,
) -> Result<Json<Vec<UnifiedAsset>>, AppError> {
    let criteria = query.to_criteria().map_err(AppError::BadRequest)?;
    Ok(Json(state.manager.list_assets(&ctx, &criteria).await?))
}

pub async fn get_asset(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path((asset_type, id)): Path<(String, Uuid)>,
) -> Result<Json<UnifiedAsset>, AppError> {
    let asset_type = parse_asset_type(&asset_type)?;
    Ok(Json(state.manager.get_asset(&ctx, asset_type, id).await?))
}

/// Edit one or more fields of an asset. The body is `{column: value}`;
/// `null` clears a nullable column.
pub async fn update_asset(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path((asset_type, id)): Path<(String, Uuid)>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<UnifiedAsset>, AppError> {
    let asset_type = parse_asset_type(&asset_type)?;
    let patch = parse_patch(asset_type, fields).map_err(MutationError::from)?;
    let record = state
        .manager
        .update_fields(&ctx, AssetRef::new(asset_type, id), &patch)
        .await?;
    Ok(Json(UnifiedAsset::from(record)))
}

/// Delete one asset; a still-referenced record answers 409
pub async fn delete_asset(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path((asset_type, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let asset_type = parse_asset_type(&asset_type)?;
    state
        .manager
        .delete_asset(&ctx, AssetRef::new(asset_type, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

pub async fn add_tag(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path((asset_type, id)): Path<(String, Uuid)>,
    Json(req): Json<TagRequest>,
) -> Result<Json<TagsResponse>, AppError> {
    let asset_type = parse_asset_type(&asset_type)?;
    let tags = state
        .manager
        .add_tag(&ctx, AssetRef::new(asset_type, id), &req.tag)
        .await?;
    Ok(Json(TagsResponse { tags }))
}

pub async fn remove_tag(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path((asset_type, id, tag)): Path<(String, Uuid, String)>,
) -> Result<Json<TagsResponse>, AppError> {
    let asset_type = parse_asset_type(&asset_type)?;
    let tags = state
        .manager
        .remove_tag(&ctx, AssetRef::new(asset_type, id), &tag)
        .await?;
    Ok(Json(TagsResponse { tags }))
}

/// Create one asset per staged line
pub async fn create_batch(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<BatchCreate>,
) -> Result<(StatusCode, Json<Vec<UnifiedAsset>>), AppError> {
    let created: Vec<UnifiedAsset> = state
        .manager
        .create_batch(&ctx, &req)
        .await?
        .into_iter()
        .map(UnifiedAsset::from)
        .collect();
    Ok((StatusCode::CREATED, Json(created)))
}

// ============================================================================
// Bulk operations
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TypeOutcomeResponse {
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-type results of a bulk call; partial success is a normal outcome
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub all_succeeded: bool,
    pub succeeded: Vec<TypeOutcomeResponse>,
    pub failed: Vec<TypeOutcomeResponse>,
}

impl From<BulkOutcome> for BulkResponse {
    fn from(outcome: BulkOutcome) -> Self {
        let all_succeeded = outcome.all_succeeded();
        let (ok, failed): (Vec<_>, Vec<_>) = outcome.outcomes.into_iter().partition(|o| o.is_ok());
        let to_response = |o: crate::workflows::TypeOutcome| TypeOutcomeResponse {
            error: o.error_message(),
            asset_type: o.asset_type,
            ids: o.ids,
        };
        Self {
            all_succeeded,
            succeeded: ok.into_iter().map(to_response).collect(),
            failed: failed.into_iter().map(to_response).collect(),
        }
    }
}

pub async fn bulk_update(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<BulkUpdate>,
) -> Result<Json<BulkResponse>, AppError> {
    let outcome = state.manager.bulk_update(&ctx, &req).await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub targets: Vec<AssetRef>,
}

pub async fn bulk_delete(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkResponse>, AppError> {
    let outcome = state.manager.delete_assets(&ctx, &req.targets).await?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// Profile links
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub role: LinkRole,
}

pub async fn list_profile_links(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<ProfileOrganizationLink>>, AppError> {
    Ok(Json(state.manager.list_profile_links(&ctx, profile_id).await?))
}

pub async fn link_profile(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path(profile_id): Path<Uuid>,
    Json(req): Json<LinkRequest>,
) -> Result<(StatusCode, Json<ProfileOrganizationLink>), AppError> {
    let link = state
        .manager
        .link_profile(&ctx, profile_id, req.organization_id, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn unlink_profile(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Path(link_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.manager.unlink_profile(&ctx, link_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Activity and team
// ============================================================================

/// Grouped activity timeline, newest first
pub async fn list_activity(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<ActivityParams>,
) -> Result<Json<Vec<ActivityGroup>>, AppError> {
    let query = params.to_query().map_err(AppError::BadRequest)?;
    Ok(Json(state.manager.activity_timeline(&ctx, &query).await?))
}

pub async fn list_team_members(
    State(state): State<DeskState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<TeamMember>>, AppError> {
    Ok(Json(state.manager.list_team_members(&ctx).await?))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<MutationError> for AppError {
    fn from(err: MutationError) -> Self {
        let message = err.user_message();
        match err {
            MutationError::Validation(_) => AppError::BadRequest(message),
            MutationError::Forbidden { .. } => AppError::Forbidden(message),
            MutationError::NotFound { .. } => AppError::NotFound(message),
            MutationError::ReferentialIntegrity { .. } => AppError::Conflict(message),
            MutationError::Store(detail) => {
                tracing::error!(error = %detail, "Store call failed");
                AppError::Internal(anyhow::anyhow!(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::ValidationError;

    #[test]
    fn test_mutation_errors_map_to_status() {
        let cases: Vec<(MutationError, StatusCode)> = vec![
            (ValidationError::EmptyName.into(), StatusCode::BAD_REQUEST),
            (
                MutationError::Forbidden {
                    role: crate::context::Role::Viewer,
                    action: "edit assets",
                },
                StatusCode::FORBIDDEN,
            ),
            (
                MutationError::not_found(AssetType::Page, Uuid::new_v4()),
                StatusCode::NOT_FOUND,
            ),
            (
                MutationError::ReferentialIntegrity {
                    asset_type: AssetType::Organization,
                    detail: "fk".into(),
                },
                StatusCode::CONFLICT,
            ),
            (MutationError::Store("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let resp = AppError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }

    #[test]
    fn test_link_request_role_defaults() {
        let req: LinkRequest = serde_json::from_str(r#"{"organization_id": null}"#).unwrap();
        assert!(req.organization_id.is_none());
        assert_eq!(req.role, LinkRole::Administrator);
    }
}
