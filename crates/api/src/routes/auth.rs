//! Token issue, logout and whoami routes

use axum::{
    extract::{Extension, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use gluten_shared::UserProfile;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{verify_password, AuthUser, TOKEN_COOKIE},
    error::{ApiError, ApiResult},
    response::{success, success_with_message},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub username: String,
    pub token: String,
    pub expires_in_days: u32,
}

/// Exchange a username and password for a token.
///
/// The token is returned in the body and set as the `token` cookie. Any
/// token previously issued to the user stops working.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Response> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let user = state
        .backend
        .directory()
        .find_by_username(&req.username)
        .await?
        .ok_or_else(|| {
            tracing::warn!(username = %req.username, "token: User not found");
            ApiError::InvalidCredentials
        })?;

    if !user.is_active {
        tracing::warn!(username = %user.username, "token: Inactive user");
        return Err(ApiError::InvalidCredentials);
    }

    let valid = verify_password(&req.password, &user.password_hash).unwrap_or_else(|e| {
        tracing::error!(
            username = %user.username,
            error = ?e,
            "token: Stored password hash is unusable"
        );
        false
    });
    if !valid {
        tracing::warn!(username = %user.username, "token: Invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let engine = state.backend.engine();
    let token = engine.make_token(&user).await?;

    let cookie = token_cookie(
        &token,
        engine.nonce_ttl().as_secs(),
        state.config.token_cookie_secure,
    )?;
    let body = success(TokenResponse {
        username: user.username,
        token,
        expires_in_days: engine.timeout_days(),
    });

    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

/// Invalidate every token of the current user and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Response> {
    state
        .backend
        .engine()
        .invalidate_token(&auth_user.user)
        .await?;

    tracing::info!(username = %auth_user.username(), "logout: Tokens invalidated");

    let cookie = token_cookie("", 0, state.config.token_cookie_secure)?;
    let body = success_with_message(serde_json::json!({}), "Logged out");

    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

/// Profile of the authenticated user
pub async fn me(Extension(auth_user): Extension<AuthUser>) -> impl IntoResponse {
    success(UserProfile::from(&auth_user.user))
}

fn token_cookie(value: &str, max_age: u64, secure: bool) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|_| ApiError::Internal)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cookie() {
        let cookie = token_cookie("668-ab-XYZ", 604_800, true).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "token=668-ab-XYZ; Path=/; Max-Age=604800; HttpOnly; SameSite=Lax; Secure"
        );

        let cleared = token_cookie("", 0, false).unwrap();
        assert_eq!(
            cleared.to_str().unwrap(),
            "token=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
        );
    }
}
