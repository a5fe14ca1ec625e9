/**
 * Viewer identity
 * Verifies bearer tokens issued by the external auth service and exposes
 * the current viewer to handlers as axum extractors. Token issuance,
 * credential storage, and refresh flows live in that service; the only
 * shared contract is the HS256 secret and the claim layout.
 */
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

lazy_static::lazy_static! {
    /// JWT secret key from environment, shared with the auth service.
    pub static ref JWT_SECRET: String = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "default-jwt-secret-change-in-production".to_string());
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Opaque user id (UUID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>, // Optional role marker ("moderator")
    pub exp: i64,    // Expiry timestamp
    pub iat: i64,    // Issued at timestamp
}

/// Verify and decode an access token.
pub fn verify_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn viewer_from_headers(headers: &HeaderMap) -> Result<(Uuid, Claims), ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthenticated)?;
    let claims = verify_access_token(&token).map_err(|_| ApiError::Unauthenticated)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;
    Ok((user_id, claims))
}

/// The authenticated current viewer. Rejects with 401 when the bearer
/// token is missing, expired, or malformed.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: Uuid,
    pub role: Option<String>,
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (user_id, claims) = viewer_from_headers(&parts.headers)?;
        Ok(Viewer {
            user_id,
            role: claims.role,
        })
    }
}

/// Viewer for endpoints that also serve anonymous readers. A missing
/// Authorization header yields `None`; a present but invalid token is
/// still a 401 rather than a silent downgrade to anonymous.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Uuid>);

impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get("authorization").is_none() {
            return Ok(MaybeViewer(None));
        }
        let (user_id, _) = viewer_from_headers(&parts.headers)?;
        Ok(MaybeViewer(Some(user_id)))
    }
}

/// A viewer whose token carries the moderator role.
#[derive(Debug, Clone)]
pub struct Moderator {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for Moderator
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (user_id, claims) = viewer_from_headers(&parts.headers)?;
        if claims.role.as_deref() != Some("moderator") {
            return Err(ApiError::NotAuthorized);
        }
        Ok(Moderator { user_id })
    }
}

/// Mint a token the way the external auth service does. Test-only; the
/// service itself never issues tokens.
#[cfg(test)]
pub fn mint_token(user_id: Uuid, role: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.map(String::from),
        exp: (now + chrono::Duration::minutes(15)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use tower::ServiceExt;

    async fn whoami(viewer: Viewer) -> Json<String> {
        Json(viewer.user_id.to_string())
    }

    async fn maybe_whoami(MaybeViewer(viewer): MaybeViewer) -> Json<Option<String>> {
        Json(viewer.map(|id| id.to_string()))
    }

    async fn mod_only(moderator: Moderator) -> Json<String> {
        Json(moderator.user_id.to_string())
    }

    fn test_router() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/maybe", get(maybe_whoami))
            .route("/mod", get(mod_only))
    }

    async fn get_with_auth(uri: &str, token: Option<&str>) -> StatusCode {
        let mut builder = Request::get(uri);
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {}", t));
        }
        let res = test_router()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        res.status()
    }

    #[test]
    fn test_mint_and_verify_round_trip() {
        let user_id = Uuid::new_v4();
        let token = mint_token(user_id, Some("moderator"));
        let claims = verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role.as_deref(), Some("moderator"));
    }

    #[test]
    fn test_verify_access_token_invalid_returns_err() {
        let result = verify_access_token("invalid.jwt.token");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_viewer_without_token_returns_unauthorized() {
        assert_eq!(
            get_with_auth("/whoami", None).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_viewer_with_garbage_token_returns_unauthorized() {
        assert_eq!(
            get_with_auth("/whoami", Some("garbage")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_viewer_with_valid_token_passes() {
        let token = mint_token(Uuid::new_v4(), None);
        assert_eq!(get_with_auth("/whoami", Some(&token)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_maybe_viewer_allows_anonymous() {
        assert_eq!(get_with_auth("/maybe", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_maybe_viewer_rejects_bad_token() {
        assert_eq!(
            get_with_auth("/maybe", Some("garbage")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_moderator_requires_role_claim() {
        let plain = mint_token(Uuid::new_v4(), None);
        assert_eq!(
            get_with_auth("/mod", Some(&plain)).await,
            StatusCode::FORBIDDEN
        );

        let moderator = mint_token(Uuid::new_v4(), Some("moderator"));
        assert_eq!(
            get_with_auth("/mod", Some(&moderator)).await,
            StatusCode::OK
        );
    }
}
