use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{User, UserRow},
    repository::RepositoryState,
};

/// Header honoured only in `Env::Local` to act as a given user id.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the HS256 bearer tokens this service accepts.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's primary key, rendered as a decimal string.
    pub sub: String,
    /// Expiration time (seconds since epoch). Always validated.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// issue_token
///
/// Signs a bearer token for `user_id` valid for `ttl`. Used by the operator
/// bootstrap; regular login is handled elsewhere.
pub fn issue_token(config: &AppConfig, user_id: i64, ttl: Duration) -> Result<String, ApiError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ApiError::Storage(format!("system clock before epoch: {e}")))?;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.as_secs() as usize,
        exp: (now + ttl).as_secs() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Storage(format!("token signing failed: {e}")))
}

// The `x-user-id` value, honoured only in `Env::Local`.
fn local_bypass_id(parts: &Parts, config: &AppConfig) -> Option<i64> {
    if config.env != Env::Local {
        return None;
    }
    parts
        .headers
        .get(LOCAL_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse::<i64>().ok())
}

// Subject of a valid bearer token, or `Unauthenticated`.
fn bearer_subject(parts: &Parts, config: &AppConfig) -> Result<i64, ApiError> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;

    let mut validation = Validation::default();
    // Expiry is always enforced.
    validation.validate_exp = true;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| ApiError::Unauthenticated),
        Err(e) => {
            tracing::debug!(reason = ?e.kind(), "bearer token rejected");
            Err(ApiError::Unauthenticated)
        }
    }
}

// One lookup on a session of its own, released before the handler runs.
async fn load_user(repo: &RepositoryState, user_id: i64) -> Result<Option<UserRow>, ApiError> {
    let mut session = repo.session().await?;
    session.fetch_user(user_id).await
}

/// current_active_user
///
/// Resolves credentials to a stored user. Unknown subjects fail
/// `Unauthenticated`; deactivated accounts fail `AccountInactive`.
///
/// The local `x-user-id` bypass only wins when it names an existing user;
/// otherwise resolution falls through to the bearer token.
pub async fn current_active_user(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<User, ApiError> {
    // 1. Local Development Bypass
    let bypassed = match local_bypass_id(parts, config) {
        Some(user_id) => {
            let found = load_user(repo, user_id).await?;
            if found.is_none() {
                tracing::debug!(user_id, "bypass user not found, trying bearer token");
            }
            found
        }
        None => None,
    };

    // 2. Token Validation and Database Lookup
    let row = match bypassed {
        Some(row) => row,
        None => {
            let user_id = bearer_subject(parts, config)?;
            load_user(repo, user_id)
                .await?
                .ok_or(ApiError::Unauthenticated)?
        }
    };

    // 3. Account Status
    if !row.is_active {
        return Err(ApiError::AccountInactive);
    }
    Ok(row.into())
}

/// current_admin_user
///
/// `current_active_user` plus the superuser capability check.
pub async fn current_admin_user(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<User, ApiError> {
    let user = current_active_user(parts, repo, config).await?;
    ensure_admin(&user)?;
    Ok(user)
}

pub fn ensure_admin(user: &User) -> Result<(), ApiError> {
    if user.is_superuser {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin privileges required".into()))
    }
}

/// ensure_self_or_admin
///
/// Route policy for single-user endpoints: the caller must be the target or
/// a superuser.
pub fn ensure_self_or_admin(caller: &User, target_id: i64) -> Result<(), ApiError> {
    if caller.id == target_id || caller.is_superuser {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// ActiveUser
///
/// Extractor for any authenticated, active caller.
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

/// AdminUser
///
/// Extractor for an authenticated, active superuser. Independent of
/// `ActiveUser`; handlers pick whichever capability the route needs.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for ActiveUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Dependency Resolution
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        current_active_user(parts, &repo, &config)
            .await
            .map(ActiveUser)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Dependency Resolution
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        current_admin_user(parts, &repo, &config)
            .await
            .map(AdminUser)
    }
}
