//! Storage traits for users and items
//!
//! Both the PostgreSQL store and the in-memory store implement these, so the
//! API layer never depends on a concrete backend.

use async_trait::async_trait;

use crate::{Item, NewItem, NewUser, Result, User};

/// Credential store operations
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user
    ///
    /// Fails with `CoreError::Conflict` when the username or email is already
    /// taken, including when a concurrent insert wins the race.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get user by username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get the first user matching either the username or the email
    async fn find_by_username_or_email(&self, username: &str, email: &str)
        -> Result<Option<User>>;
}

/// Item store operations
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new item; `created_at` is assigned by the store
    async fn create_item(&self, item: NewItem) -> Result<Item>;

    /// List every item, regardless of owner, ordered by id
    async fn list_items(&self) -> Result<Vec<Item>>;

    /// Get an item only if it exists and belongs to `owner_id`
    async fn find_owned_item(&self, id: i64, owner_id: i64) -> Result<Option<Item>>;

    /// Delete an item only if it exists and belongs to `owner_id`
    ///
    /// Returns the deleted item, or `None` when nothing matched.
    async fn delete_owned_item(&self, id: i64, owner_id: i64) -> Result<Option<Item>>;
}
