//! Authentication service layer
//!
//! Provides business logic for user registration, login, token refresh, and logout.
//! Password work runs on the blocking pool; Argon2 is deliberately slow.

use super::jwt::{TokenService, TokenType};
use super::password::PasswordHasher;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use crate::state::AppState;
use itemdesk_core::{CoreError, NewUser, User, UserStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

const DUPLICATE_USER: &str = "Username or email already registered";
const BAD_CREDENTIALS: &str = "Incorrect username or password";
pub const LOGOUT_MESSAGE: &str = "Logout successful (client should delete tokens)";

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// User login request, as JSON or an OAuth2 password form
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Public user projection; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Tokens issued on login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `bearer`
    pub token_type: String,
}

/// Access token minted by refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Authentication service
///
/// Borrows the shared components from [`AppState`]; build one per request.
pub struct AuthService<'a> {
    tokens: &'a TokenService,
    passwords: &'a PasswordHasher,
    users: &'a dyn UserStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service
    pub fn new(state: &'a AppState) -> Self {
        Self {
            tokens: &state.tokens,
            passwords: &state.passwords,
            users: state.users.as_ref(),
        }
    }

    /// Register a new user
    ///
    /// Duplicate usernames or emails are rejected with 400, whether caught
    /// by the pre-check or by the store's unique constraint.
    pub async fn register(
        &self,
        request: RegisterRequest,
        context: &RequestContext,
    ) -> Result<UserResponse, AppError> {
        info!(username = %request.username, email = %request.email, "Registration attempt");

        if self
            .users
            .find_by_username_or_email(&request.username, &request.email)
            .await?
            .is_some()
        {
            return Err(self.registration_conflict(&request.username, context));
        }

        let hashed_password = self.hash_password(request.password).await?;

        let user = match self
            .users
            .create_user(NewUser {
                username: request.username.clone(),
                email: request.email,
                hashed_password,
            })
            .await
        {
            Ok(user) => user,
            Err(CoreError::Conflict(_)) => {
                return Err(self.registration_conflict(&request.username, context))
            }
            Err(e) => return Err(e.into()),
        };

        audit_log(
            &AuditEvent::RegistrationSuccess {
                user_id: user.id,
                username: user.username.clone(),
            },
            context,
        );
        info!(user_id = user.id, username = %user.username, "User registered");

        Ok(user.into())
    }

    /// Authenticate with username and password and issue a token pair
    pub async fn login(
        &self,
        request: LoginRequest,
        context: &RequestContext,
    ) -> Result<TokenPairResponse, AppError> {
        info!(username = %request.username, "Login attempt");

        let user = self.users.find_by_username(&request.username).await?;
        // Unknown usernames still pay for a full verification
        let stored_hash = user.as_ref().map(|user| user.hashed_password.clone());
        let verified = self.verify_password(request.password, stored_hash).await?;

        let user = match user {
            Some(user) if verified => user,
            found => {
                let reason = if found.is_some() {
                    "Invalid password"
                } else {
                    "Unknown username"
                };
                warn!(username = %request.username, "Login failed: invalid credentials");
                audit_log(
                    &AuditEvent::LoginFailure {
                        username: request.username,
                        reason: reason.to_string(),
                    },
                    context,
                );
                return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
            }
        };

        let access_token = self.tokens.issue_access(&user.username)?;
        let refresh_token = self.tokens.issue_refresh(&user.username)?;

        audit_log(
            &AuditEvent::LoginSuccess {
                user_id: user.id,
                username: user.username.clone(),
            },
            context,
        );
        info!(user_id = user.id, username = %user.username, "User logged in");

        Ok(TokenPairResponse {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The subject is not looked up again; a refresh token stays usable
    /// until it expires.
    pub fn refresh(
        &self,
        refresh_token: &str,
        context: &RequestContext,
    ) -> Result<AccessTokenResponse, AppError> {
        let claims = match self.tokens.decode(refresh_token) {
            Some(claims) if claims.token_type == TokenType::Refresh => claims,
            Some(claims) => {
                return Err(refresh_failure(
                    "Invalid refresh token",
                    &format!("Wrong token type: {}", claims.token_type),
                    context,
                ))
            }
            None => {
                return Err(refresh_failure(
                    "Invalid refresh token",
                    "Invalid or expired token",
                    context,
                ))
            }
        };

        let username = claims.subject().ok_or_else(|| {
            refresh_failure("Invalid token payload", "Missing subject", context)
        })?;

        let access_token = self.tokens.issue_access(username)?;

        audit_log(
            &AuditEvent::TokenRefresh {
                username: username.to_string(),
            },
            context,
        );

        Ok(AccessTokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Acknowledge a logout
    ///
    /// Tokens are stateless; the client discards them.
    pub fn logout(&self, context: &RequestContext) -> MessageResponse {
        audit_log(&AuditEvent::Logout, context);
        MessageResponse::new(LOGOUT_MESSAGE)
    }

    fn registration_conflict(&self, username: &str, context: &RequestContext) -> AppError {
        warn!(username = %username, "Registration failed: user already exists");
        audit_log(
            &AuditEvent::RegistrationFailure {
                username: username.to_string(),
                reason: DUPLICATE_USER.to_string(),
            },
            context,
        );
        AppError::BadRequest(DUPLICATE_USER.to_string())
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.passwords.clone();
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))??;
        Ok(hashed)
    }

    async fn verify_password(
        &self,
        password: String,
        hash: Option<String>,
    ) -> Result<bool, AppError> {
        let hasher = self.passwords.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify_missing(&password),
        })
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))
    }
}

fn refresh_failure(message: &str, reason: &str, context: &RequestContext) -> AppError {
    warn!(reason = %reason, "Token refresh failed");
    audit_log(
        &AuditEvent::RefreshFailure {
            reason: reason.to_string(),
        },
        context,
    );
    AppError::Unauthorized(message.to_string())
}
