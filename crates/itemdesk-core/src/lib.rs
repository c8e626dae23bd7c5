//! itemdesk Core - Domain models, stores, and shared types
//!
//! This crate defines the core abstractions used by the itemdesk API:
//! - User and item records
//! - Common error types
//! - Storage traits for users and items
//! - Configuration management
//! - PostgreSQL and in-memory store implementations

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{ItemStore, UserStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for store and domain operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// A uniqueness constraint would be violated
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Users
// ============================================================================

/// A registered user
///
/// `username` is immutable once created. The password hash never leaves the
/// server: it is skipped on serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
}

/// Data required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
}

// ============================================================================
// Items
// ============================================================================

/// An item owned by exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Fixed at creation, never reassigned
    pub owner_id: i64,
    /// Set once by the store at insert time
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Check whether the given user owns this item
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

/// Data required to create an item
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
}
