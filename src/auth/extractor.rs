// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use `Auth` in handlers to require authentication, `AdminOnly` to
//! additionally require the admin role:
//!
//! ```rust,ignore
//! async fn create_gate(AdminOnly(user): AdminOnly) -> impl IntoResponse {
//!     // user is AuthenticatedUser with Role::Admin
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;

use super::{AuthError, AuthenticatedUser, Role};
use crate::state::AppState;

/// Clock skew tolerance (seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Minimal JWT claims for decoding identity tokens.
#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    #[serde(default)]
    exp: i64,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    sid: Option<String>,
    /// Clerk public metadata containing the role
    #[serde(default, rename = "publicMetadata")]
    public_metadata: Option<PublicMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct PublicMetadata {
    #[serde(default)]
    role: Option<String>,
}

/// Extractor for authenticated users.
///
/// ## Authentication Modes
///
/// - **Production** (JWKS configured): full signature verification
/// - **Development** (no JWKS): structure and expiry validation only
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // A user injected upstream (middleware or tests) wins
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = verify_jwt(token, &state.auth_config).await?;
        Ok(Auth(user))
    }
}

/// Extractor that requires the admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }
        Ok(AdminOnly(user))
    }
}

async fn verify_jwt(
    token: &str,
    auth_config: &crate::state::AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    if let Some(ref jwks) = auth_config.jwks {
        verify_jwt_production(token, jwks, auth_config).await
    } else {
        verify_jwt_development(token)
    }
}

/// Production JWT verification against the cached JWKS.
async fn verify_jwt_production(
    token: &str,
    jwks: &super::JwksManager,
    auth_config: &crate::state::AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    let (decoding_key, algorithm) = if let Some(kid) = &header.kid {
        jwks.get_decoding_key(kid).await?
    } else {
        jwks.get_any_decoding_key().await?
    };

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;

    if let Some(ref issuer) = auth_config.issuer {
        validation.set_issuer(&[issuer]);
    }
    if let Some(ref audience) = auth_config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    let token_data =
        decode::<JwtClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        })?;

    Ok(user_from_claims(token_data.claims))
}

/// Development JWT verification (no signature check).
///
/// WARNING: development environments only.
fn verify_jwt_development(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<JwtClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(user_from_claims(claims))
}

fn user_from_claims(claims: JwtClaims) -> AuthenticatedUser {
    let role = claims
        .public_metadata
        .as_ref()
        .and_then(|m| m.role.as_ref())
        .and_then(|r| Role::from_str(r))
        .unwrap_or_default();

    AuthenticatedUser {
        user_id: claims.sub,
        role,
        session_id: claims.sid,
        issuer: claims.iss,
        expires_at: claims.exp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::http::Request;

    fn request_parts() -> Parts {
        Request::builder().uri("/test").body(()).unwrap().into_parts().0
    }

    /// Unsigned JWT, valid only in development mode.
    fn create_test_jwt(user_id: &str, role: Option<&str>) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = r#"{"alg":"RS256","typ":"JWT"}"#;
        let metadata = role
            .map(|r| format!(r#","publicMetadata":{{"role":"{r}"}}"#))
            .unwrap_or_default();
        let claims = format!(
            r#"{{"sub":"{user_id}","iat":1609459200,"exp":9999999999,"iss":"test","sid":"sess_123"{metadata}}}"#
        );

        let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.as_bytes());
        format!("{header_b64}.{claims_b64}.fake_signature")
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _temp) = test_state();
        let mut parts = request_parts();

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_dev_jwt() {
        let (state, _temp) = test_state();
        let token = create_test_jwt("user_123", None);
        let mut parts = request_parts();
        parts.headers.insert(
            AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Role::Member);
    }

    #[tokio::test]
    async fn role_is_read_from_public_metadata() {
        let (state, _temp) = test_state();
        let token = create_test_jwt("user_admin", Some("admin"));
        let mut parts = request_parts();
        parts.headers.insert(
            AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );

        let AdminOnly(user) = AdminOnly::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_admin());
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _temp) = test_state();
        let mut parts = request_parts();

        let user = AuthenticatedUser {
            user_id: "user_from_middleware".to_string(),
            role: Role::Admin,
            session_id: None,
            issuer: "middleware".to_string(),
            expires_at: 0,
        };
        parts.extensions.insert(user);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_from_middleware");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _temp) = test_state();
        let mut parts = request_parts();

        parts.extensions.insert(AuthenticatedUser {
            user_id: "user_123".to_string(),
            role: Role::Member,
            session_id: None,
            issuer: "test".to_string(),
            expires_at: 0,
        });

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }
}
