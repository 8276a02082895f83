//! API route definitions

use super::handlers::{self, DeskState};
use crate::auth::require_auth;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: DeskState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        // ====================================================================
        // Assets
        // ====================================================================
        .route("/api/assets", get(handlers::list_assets))
        .route("/api/assets/batch", post(handlers::create_batch))
        .route("/api/assets/bulk-update", post(handlers::bulk_update))
        .route("/api/assets/bulk-delete", post(handlers::bulk_delete))
        .route(
            "/api/assets/{asset_type}/{id}",
            get(handlers::get_asset)
                .patch(handlers::update_asset)
                .delete(handlers::delete_asset),
        )
        .route(
            "/api/assets/{asset_type}/{id}/tags",
            post(handlers::add_tag),
        )
        .route(
            "/api/assets/{asset_type}/{id}/tags/{tag}",
            delete(handlers::remove_tag),
        )
        // ====================================================================
        // Profile links
        // ====================================================================
        .route(
            "/api/profiles/{id}/links",
            get(handlers::list_profile_links).post(handlers::link_profile),
        )
        .route("/api/links/{id}", delete(handlers::unlink_profile))
        // ====================================================================
        // Activity and team
        // ====================================================================
        .route("/api/activity", get(handlers::list_activity))
        .route("/api/team-members", get(handlers::list_team_members))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
