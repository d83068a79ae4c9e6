//! Token authentication middleware
//!
//! Credentials arrive as a `username` + `token` pair. The token is read from
//! the `token` cookie. The username is taken from, in order:
//!
//! 1. the `username` query parameter
//! 2. the `data[username]` query parameter
//! 3. `data.username` in a JSON request body, whatever its content type
//!
//! Bodies whose declared size exceeds the buffering limit are left untouched
//! and contribute no username.

use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Query, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use gluten_shared::User;

use super::backend::TokenBackend;
use crate::error::ApiError;

pub const TOKEN_COOKIE: &str = "token";

/// Largest JSON body buffered while looking for a username
const MAX_CREDENTIAL_BODY_BYTES: usize = 1024 * 1024;

/// Authenticated user, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

/// Raw `username` + `token` pair as presented by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// Reject the request with 401 unless it carries valid credentials
pub async fn require_token_auth(
    State(backend): State<TokenBackend>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut request, credentials) = extract_credentials(request).await?;

    let credentials = credentials.ok_or(ApiError::Unauthorized)?;
    let user = backend
        .authenticate(&credentials.username, &credentials.token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(AuthUser { user });
    Ok(next.run(request).await)
}

/// Attach the user when credentials are valid, pass through otherwise
pub async fn optional_token_auth(
    State(backend): State<TokenBackend>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut request, credentials) = extract_credentials(request).await?;

    if let Some(credentials) = credentials {
        if let Some(user) = backend
            .authenticate(&credentials.username, &credentials.token)
            .await
        {
            request.extensions_mut().insert(AuthUser { user });
        }
    }

    Ok(next.run(request).await)
}

/// Pull credentials out of `request`, handing back a request whose body is
/// still readable by the handler
pub async fn extract_credentials(
    request: Request,
) -> Result<(Request, Option<Credentials>), ApiError> {
    let Some(token) = token_from_cookies(request.headers()) else {
        return Ok((request, None));
    };

    if let Some(username) = username_from_query(&request) {
        return Ok((request, Some(Credentials { username, token })));
    }

    let size = request.body().size_hint();
    if size.upper() == Some(0) || size.lower() > MAX_CREDENTIAL_BODY_BYTES as u64 {
        return Ok((request, None));
    }

    // Only undeclared-length bodies can overrun the limit here
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_CREDENTIAL_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BadRequest("Request body too large".to_string()))?;
    let username = username_from_json(&bytes);
    let request = Request::from_parts(parts, Body::from(bytes));

    Ok((request, username.map(|username| Credentials { username, token })))
}

/// Value of the token cookie, if present and non-empty
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn username_from_query(request: &Request) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok()?;
    params
        .get("username")
        .or_else(|| params.get("data[username]"))
        .filter(|username| !username.is_empty())
        .cloned()
}

fn username_from_json(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    value
        .get("data")?
        .get("username")?
        .as_str()
        .filter(|username| !username.is_empty())
        .map(str::to_string)
}
