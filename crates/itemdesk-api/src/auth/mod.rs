//! Authentication and authorization module
//!
//! This module provides JWT-based authentication with the following components:
//! - Token issuance and validation
//! - Password hashing with Argon2
//! - Middleware resolving the bearer token to a user
//! - Authentication service for register, login, refresh and logout

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{Claims, JwtError, TokenService, TokenType};
pub use middleware::{authenticate, require_auth, AuthError, CurrentUser};
pub use password::{PasswordConfig, PasswordError, PasswordHasher};
pub use service::{
    AccessTokenResponse, AuthService, LoginRequest, MessageResponse, RefreshRequest,
    RegisterRequest, TokenPairResponse, UserResponse,
};
