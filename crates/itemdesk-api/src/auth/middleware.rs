/// Authentication middleware for protecting routes
///
/// Extracts the bearer token from the Authorization header, validates it as
/// an access token and resolves the user it names. On success the user is
/// added to request extensions as [`CurrentUser`].
use super::jwt::{TokenService, TokenType};
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use itemdesk_core::{CoreError, User, UserStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Authenticated user, available to handlers behind `require_auth`
///
/// ```ignore
/// use axum::Extension;
/// use itemdesk_api::auth::CurrentUser;
///
/// async fn handler(Extension(CurrentUser(user)): Extension<CurrentUser>) -> String {
///     format!("Hello, {}!", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Expected {expected} token")]
    WrongTokenType { expected: TokenType },

    #[error("Token subject does not name a known user")]
    UnknownUser,

    #[error("User lookup failed: {0}")]
    Store(#[from] CoreError),
}

/// Resolve the user behind an access token
///
/// Refresh tokens are rejected here, so they cannot be used as bearer
/// credentials.
pub async fn authenticate(
    tokens: &TokenService,
    users: &dyn UserStore,
    token: &str,
) -> Result<User, AuthError> {
    let claims = tokens.decode(token).ok_or(AuthError::InvalidToken)?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::WrongTokenType {
            expected: TokenType::Access,
        });
    }

    let username = claims.subject().ok_or(AuthError::UnknownUser)?;
    let user = users
        .find_by_username(username)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    debug!(user_id = user.id, "Request authenticated");
    Ok(user)
}

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    // Scheme is case-insensitive
    match auth_header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Middleware that requires a valid access token
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use itemdesk_api::auth::require_auth;
///
/// let app = Router::new()
///     .route("/api/items", get(list_items))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).map(str::to_owned);
    let result = match token {
        Ok(token) => authenticate(&state.tokens, state.users.as_ref(), &token).await,
        Err(e) => Err(e),
    };

    let user = match result {
        Ok(user) => user,
        Err(AuthError::Store(e)) => return Err(e.into()),
        Err(e) => {
            audit_log(
                &AuditEvent::InvalidToken {
                    reason: e.to_string(),
                },
                &RequestContext::from_headers(request.headers()),
            );
            return Err(e.into());
        }
    };

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
