//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::jwt::{JwtError, TokenService};
use crate::auth::password::{PasswordConfig, PasswordError, PasswordHasher};
use itemdesk_core::config::AppConfig;
use itemdesk_core::{ItemStore, MemoryStore, UserStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors building application state from configuration
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Application state shared across handlers
///
/// Everything here is read-only after startup.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Token issuance and validation
    pub tokens: TokenService,
    /// Password hashing
    pub passwords: PasswordHasher,
    /// Credential store
    pub users: Arc<dyn UserStore>,
    /// Item store
    pub items: Arc<dyn ItemStore>,
}

impl AppState {
    /// Create new application state with config and stores
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        items: Arc<dyn ItemStore>,
    ) -> Result<Self, StateError> {
        let tokens = TokenService::new(&config.auth)?;
        let passwords = PasswordHasher::new(&PasswordConfig::from(&config.auth))?;

        Ok(Self {
            config,
            start_time: Instant::now(),
            tokens,
            passwords,
            users,
            items,
        })
    }

    /// State backed by a fresh [`MemoryStore`]
    pub fn in_memory(config: AppConfig) -> Result<Self, StateError> {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
