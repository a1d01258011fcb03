use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    models::UserId,
    repository::RepositoryState,
};

/// Claims
///
/// Payload expected inside the bearer JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the id of the user in the `users` table.
    pub sub: UserId,
    /// Expiration Time (exp): the token is rejected after this timestamp.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. The admin flag is read from the
/// store on every request and handed explicitly to the permission resolver; nothing
/// about the session is kept in ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub is_admin: bool,
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. The process:
/// 1. Dependency Resolution: Repository and AppConfig from the application state.
/// 2. Local Bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 3. Token Validation: Bearer token extraction and JWT decoding.
/// 4. DB Lookup: the user must still exist; the admin flag comes from the row.
///
/// Rejection: Returns StatusCode::UNAUTHORIZED (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Development bypass, guarded by the Env check.
        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<UserId>().ok());

            if let Some(user_id) = bypass_id {
                match repo.get_user(user_id).await {
                    Ok(Some(user)) => {
                        return Ok(AuthUser {
                            id: user.id,
                            is_admin: user.is_admin,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("auth bypass lookup failed: {:?}", e);
                        return Err(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                }
            }
        }
        // Production, or a failed bypass: fall through to JWT validation.

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("expired token rejected"),
                other => tracing::debug!("invalid token rejected: {:?}", other),
            }
            StatusCode::UNAUTHORIZED
        })?;

        // The token may outlive the user; the row is the source of truth for the admin flag.
        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("auth user lookup failed: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: user.id,
            is_admin: user.is_admin,
        })
    }
}
