//! Security audit logging for authentication and ownership events
//!
//! All audit events are logged with the "audit" target, so they can be
//! filtered (`RUST_LOG=audit=info`) and routed separately from request logs.
//! Successful events log at INFO, rejected ones at WARN.
//!
//! # Example
//!
//! ```ignore
//! use itemdesk_api::audit::{audit_log, AuditEvent, RequestContext};
//!
//! audit_log(
//!     &AuditEvent::LoginSuccess { user_id: user.id, username: user.username.clone() },
//!     &RequestContext::from_headers(&headers),
//! );
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// New account created
    RegistrationSuccess { user_id: i64, username: String },

    /// Registration rejected (duplicate username or email)
    RegistrationFailure { username: String, reason: String },

    /// Credentials accepted, token pair issued
    LoginSuccess { user_id: i64, username: String },

    /// Credentials rejected
    LoginFailure { username: String, reason: String },

    /// Access token minted from a refresh token
    TokenRefresh { username: String },

    /// Refresh token rejected
    RefreshFailure { reason: String },

    /// Client-side logout acknowledged (no server state changes)
    Logout,

    /// Bearer credential rejected on a protected route
    InvalidToken { reason: String },

    /// Item removed by its owner
    ItemDeleted { item_id: i64, user_id: i64 },
}

impl AuditEvent {
    fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::RegistrationFailure { .. }
                | Self::LoginFailure { .. }
                | Self::RefreshFailure { .. }
                | Self::InvalidToken { .. }
        )
    }

    fn summary(&self) -> &'static str {
        match self {
            Self::RegistrationSuccess { .. } => "Registration successful",
            Self::RegistrationFailure { .. } => "Registration failed",
            Self::LoginSuccess { .. } => "Login successful",
            Self::LoginFailure { .. } => "Login failed",
            Self::TokenRefresh { .. } => "Token refresh",
            Self::RefreshFailure { .. } => "Token refresh failed",
            Self::Logout => "User logout",
            Self::InvalidToken { .. } => "Invalid token",
            Self::ItemDeleted { .. } => "Item deleted",
        }
    }
}

/// Client information attached to every audit record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Collect client information from request headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log an audit event
pub fn audit_log(event: &AuditEvent, context: &RequestContext) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    if event.is_failure() {
        warn!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            ip_address = ?context.ip_address,
            user_agent = ?context.user_agent,
            "{}",
            event.summary()
        );
    } else {
        info!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            ip_address = ?context.ip_address,
            user_agent = ?context.user_agent,
            "{}",
            event.summary()
        );
    }
}

/// Client IP from proxy headers
///
/// Takes the first address of `X-Forwarded-For`, then `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first_ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|ip| ip.to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
