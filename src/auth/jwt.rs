//! JWT token encoding and decoding using HS256.
//!
//! The token carries the caller's identity together with the team it acts in
//! and its role there, so every request resolves to a [`TeamContext`].

use crate::context::{Role, TeamContext};
use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user UUID
    pub sub: String,
    /// Team the token acts in
    pub team_id: String,
    pub role: Role,
    /// Display name, recorded as the actor of audit entries
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Resolve the claims into a team context. Fails on malformed ids.
    pub fn team_context(&self) -> Result<TeamContext> {
        let user_id: Uuid = self.sub.parse().context("Invalid user ID in token")?;
        let team_id: Uuid = self.team_id.parse().context("Invalid team ID in token")?;
        Ok(TeamContext::new(user_id, team_id, self.role).with_actor_name(self.name.clone()))
    }
}

/// Encode a JWT token for the given user acting in `team_id`.
pub fn encode_jwt(
    user_id: Uuid,
    team_id: Uuid,
    role: Role,
    name: &str,
    secret: &str,
    expiry_secs: u64,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        team_id: team_id.to_string(),
        role,
        name: name.to_string(),
        iat: now,
        exp: now + expiry_secs as i64,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT")
}

/// Decode and validate a JWT token.
///
/// Returns the claims if the token is valid, not expired, and
/// signed with the correct secret.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Failed to decode JWT")?;

    Ok(token_data.claims)
}

// ============================================================================
// Tests
// ============================================================================
