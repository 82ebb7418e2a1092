//! Bearer-token identity boundary
//!
//! Tokens are HS256 JWTs carrying the subject id and whether the subject is
//! an end user or an organization. Handlers take [`AuthUser`] or [`AuthOrg`]
//! and receive an already-validated id.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::handlers::{ApiError, AppState};

/// Kind of subject a token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Org,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::Org => "org",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id (UUID string)
    pub sub: String,
    pub user_type: SubjectKind,
    pub iat: i64,
    pub exp: i64,
}

/// Mint a bearer token for `subject`.
pub fn issue_token(
    secret: &str,
    subject: Uuid,
    kind: SubjectKind,
    ttl: Duration,
) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        user_type: kind,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify a bearer token and return its subject.
pub fn verify_token(secret: &str, token: &str) -> Result<(Uuid, SubjectKind), ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["sub", "exp"]);

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let subject = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ApiError::unauthorized("Token subject is not a valid id"))?;

    Ok((subject, data.claims.user_type))
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Expected 'Bearer <token>'"))?;

    if token.is_empty() {
        return Err(ApiError::unauthorized("Empty bearer token"));
    }

    Ok(token)
}

fn authenticate(parts: &Parts, state: &AppState, expected: SubjectKind) -> Result<Uuid, ApiError> {
    let (subject, kind) = verify_token(&state.jwt_secret, bearer_token(parts)?)?;

    if kind != expected {
        return Err(ApiError::forbidden(format!(
            "This endpoint requires a {} token",
            expected.as_str()
        )));
    }

    Ok(subject)
}

/// An authenticated end user.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, SubjectKind::User).map(Self)
    }
}

/// An authenticated organization.
#[derive(Debug, Clone, Copy)]
pub struct AuthOrg(pub Uuid);

impl FromRequestParts<Arc<AppState>> for AuthOrg {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, SubjectKind::Org).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let subject = Uuid::new_v4();
        let token = issue_token(SECRET, subject, SubjectKind::Org, Duration::hours(1)).unwrap();

        let (verified, kind) = verify_token(SECRET, &token).unwrap();
        assert_eq!(verified, subject);
        assert_eq!(kind, SubjectKind::Org);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token =
            issue_token(SECRET, Uuid::new_v4(), SubjectKind::User, Duration::hours(1)).unwrap();

        let err = verify_token("other-secret", &token).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_rejected() {
        let token =
            issue_token(SECRET, Uuid::new_v4(), SubjectKind::User, Duration::hours(-2)).unwrap();

        let err = verify_token(SECRET, &token).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_claims_serialize_lowercase_kind() {
        let claims = Claims {
            sub: Uuid::nil().to_string(),
            user_type: SubjectKind::User,
            iat: 0,
            exp: 1,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["user_type"], "user");
    }
}
