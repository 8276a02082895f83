//! AuthUser extractor for Axum handlers.
//!
//! Extracts the caller's team context from request extensions
//! (populated by the `require_auth` middleware).

use crate::api::handlers::{AppError, DeskState};
use crate::auth::jwt::Claims;
use crate::context::TeamContext;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Authenticated caller, resolved to the team it acts in.
///
/// ```rust,ignore
/// async fn my_handler(AuthUser(ctx): AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", ctx.actor())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub TeamContext);

impl AuthUser {
    fn from_claims(claims: &Claims) -> Result<Self, AppError> {
        claims
            .team_context()
            .map(Self)
            .map_err(|e| AppError::Unauthorized(e.to_string()))
    }
}

impl FromRequestParts<DeskState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &DeskState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async {
            let claims = parts.extensions.get::<Claims>().ok_or_else(|| {
                AppError::Unauthorized("Authentication required, no claims in request".to_string())
            })?;

            Self::from_claims(claims)
        }
    }
}
