use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use super::{jwt::JwtKeys, repo_types::User};
use crate::{
    error::{AppError, StoreResultExt},
    state::AppState,
};

/// Cookie set by the Google callback.
pub const AUTH_COOKIE: &str = "authToken";

/// Extracts and validates the JWT, returning the user ID.
///
/// The `Authorization: Bearer` header wins; the `authToken` cookie is the
/// fallback for browser sessions started through Google.
pub struct AuthUser(pub Uuid);

fn bearer_token(parts: &Parts) -> Option<String> {
    let auth = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| {
                CookieJar::from_headers(&parts.headers)
                    .get(AUTH_COOKIE)
                    .map(|c| c.value().to_string())
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Auth("Missing authentication token".into()))?;

        let claims = JwtKeys::from_ref(state).verify(&token).map_err(|e| {
            warn!(error = %e, "jwt rejected");
            AppError::Auth("Invalid or expired token".into())
        })?;

        Ok(AuthUser(claims.sub))
    }
}

/// An authenticated user whose account still exists and is active.
pub struct ActiveUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = state
            .store
            .find_user_by_id(user_id)
            .await
            .during("load user")?
            .ok_or_else(|| AppError::Auth("User not found".into()))?;
        if !user.is_active {
            return Err(AppError::Auth("Account is deactivated".into()));
        }
        Ok(ActiveUser(user))
    }
}

/// An active user holding the `admin` role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = state
            .store
            .find_user_by_id(user_id)
            .await
            .during("load user")?;
        match user {
            Some(user) if user.is_active && user.is_admin() => Ok(AdminUser(user)),
            _ => {
                warn!(user_id = %user_id, "admin route denied");
                Err(AppError::Forbidden("Access denied. Admins only.".into()))
            }
        }
    }
}
