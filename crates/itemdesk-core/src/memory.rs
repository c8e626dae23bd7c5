//! In-memory store for development and testing
//!
//! Enforces the same constraints as the PostgreSQL schema (unique username
//! and email, existing item owner) under a single mutex, so it can stand in
//! for the database in tests. Data is lost when the process exits.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::store::{ItemStore, UserStore};
use crate::{CoreError, Item, NewItem, NewUser, Result, User};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    items: BTreeMap<i64, Item>,
    next_user_id: i64,
    next_item_id: i64,
}

/// In-memory user and item store
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn user_count(&self) -> usize {
        self.lock().map(|t| t.users.len()).unwrap_or_default()
    }

    /// Number of stored items
    pub fn item_count(&self) -> usize {
        self.lock().map(|t| t.items.len()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| CoreError::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.lock()?;

        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(CoreError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            hashed_password: user.hashed_password,
        };
        tables.users.insert(created.id, created.clone());

        debug!(user_id = created.id, "User created in memory");
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn create_item(&self, item: NewItem) -> Result<Item> {
        let mut tables = self.lock()?;

        if !tables.users.contains_key(&item.owner_id) {
            return Err(CoreError::ValidationError(format!(
                "Owner {} does not exist",
                item.owner_id
            )));
        }

        tables.next_item_id += 1;
        let created = Item {
            id: tables.next_item_id,
            title: item.title,
            description: item.description,
            owner_id: item.owner_id,
            created_at: Utc::now(),
        };
        tables.items.insert(created.id, created.clone());

        debug!(item_id = created.id, owner_id = created.owner_id, "Item created in memory");
        Ok(created)
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let tables = self.lock()?;
        Ok(tables.items.values().cloned().collect())
    }

    async fn find_owned_item(&self, id: i64, owner_id: i64) -> Result<Option<Item>> {
        let tables = self.lock()?;
        Ok(tables
            .items
            .get(&id)
            .filter(|item| item.is_owned_by(owner_id))
            .cloned())
    }

    async fn delete_owned_item(&self, id: i64, owner_id: i64) -> Result<Option<Item>> {
        let mut tables = self.lock()?;
        let owned = tables
            .items
            .get(&id)
            .is_some_and(|item| item.is_owned_by(owner_id));

        if !owned {
            return Ok(None);
        }
        Ok(tables.items.remove(&id))
    }
}
