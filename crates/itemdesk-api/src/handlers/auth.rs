//! Authentication API handlers
//!
//! Provides HTTP endpoints for registration, login, token refresh and logout.
//! None of them require a bearer token.
//!
//! Author: hephaex@gmail.com

use crate::audit::RequestContext;
use crate::auth::{
    AccessTokenResponse, AuthService, LoginRequest, MessageResponse, RefreshRequest,
    RegisterRequest, TokenPairResponse, UserResponse,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, Query, Request, State,
    },
    http::{header, HeaderMap},
    Form, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

/// Login credentials from either a form or a JSON body
///
/// OAuth2 password-flow clients post `application/x-www-form-urlencoded`;
/// anything declaring `application/json` is read as JSON instead.
#[derive(Debug)]
pub struct LoginCredentials(pub LoginRequest);

#[async_trait]
impl<S> FromRequest<S> for LoginCredentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(request) = Json::<LoginRequest>::from_request(req, state).await?;
            Ok(Self(request))
        } else {
            let Form(request) = Form::<LoginRequest>::from_request(req, state).await?;
            Ok(Self(request))
        }
    }
}

/// Refresh token passed as a query parameter
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RefreshQuery {
    /// Refresh token from login
    pub refresh_token: Option<String>,
}

/// Register a new user account
///
/// # Responses
///
/// * `200 OK` - User registered, returns the public user record
/// * `400 Bad Request` - Username or email already registered, or malformed body
/// * `500 Internal Server Error` - Server error
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Username or email already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(request) = body?;
    let context = RequestContext::from_headers(&headers);

    let user = AuthService::new(&state).register(request, &context).await?;
    Ok(Json(user))
}

/// Login with username and password
///
/// Accepts an OAuth2 password form or a JSON body and returns an access and
/// a refresh token.
///
/// # Responses
///
/// * `200 OK` - Authentication successful, returns tokens
/// * `401 Unauthorized` - Incorrect username or password
/// * `500 Internal Server Error` - Server error
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body(
        content = LoginRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "OAuth2 password form; a JSON body is also accepted"
    ),
    responses(
        (status = 200, description = "Login successful", body = TokenPairResponse),
        (status = 401, description = "Incorrect username or password", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    LoginCredentials(request): LoginCredentials,
) -> Result<Json<TokenPairResponse>, AppError> {
    let context = RequestContext::from_headers(&headers);

    let tokens = AuthService::new(&state).login(request, &context).await?;
    Ok(Json(tokens))
}

/// Refresh access token
///
/// Exchanges a valid refresh token for a new access token. The refresh token
/// itself is not rotated.
///
/// # Responses
///
/// * `200 OK` - New access token issued
/// * `400 Bad Request` - No refresh token supplied
/// * `401 Unauthorized` - Invalid, expired or wrong-type token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    params(RefreshQuery),
    request_body(content = RefreshRequest, description = "Alternative to the query parameter"),
    responses(
        (status = 200, description = "Token refreshed successfully", body = AccessTokenResponse),
        (status = 400, description = "Missing refresh token", body = crate::error::ApiError),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RefreshQuery>, QueryRejection>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let Query(query) = query?;
    let refresh_token = query
        .refresh_token
        .or_else(|| body.map(|Json(body)| body.refresh_token))
        .ok_or_else(|| AppError::BadRequest("refresh_token is required".to_string()))?;

    let context = RequestContext::from_headers(&headers);
    let response = AuthService::new(&state).refresh(&refresh_token, &context)?;
    Ok(Json(response))
}

/// Logout
///
/// Tokens are stateless, so nothing is invalidated server-side; the client
/// is expected to discard its tokens.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout acknowledged", body = MessageResponse),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    let context = RequestContext::from_headers(&headers);
    Json(AuthService::new(&state).logout(&context))
}
