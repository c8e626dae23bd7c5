//! PostgreSQL store
//!
//! Provides user and item persistence using SQLx and PostgreSQL. Every call
//! borrows a pooled connection that is returned to the pool when the call
//! finishes, whichever way it exits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::store::{ItemStore, UserStore};
use crate::{CoreError, Item, NewItem, NewUser, Result, User};

const DUPLICATE_USER: &str = "Username or email already registered";

/// Schema statements, safe to run on every startup
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        owner_id BIGINT NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_items_title ON items (title)",
    "CREATE INDEX IF NOT EXISTS ix_items_owner_id ON items (owner_id)",
];

/// PostgreSQL-backed user and item store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store with its own connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| CoreError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        info!(max_connections = config.max_connections, "Database connected");
        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::DatabaseError(format!("Schema setup failed: {e}")))?;
        }
        info!("Database tables created/verified");
        Ok(())
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database disconnected");
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    hashed_password: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            hashed_password: row.hashed_password,
        }
    }
}

/// Item row from database
#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    description: Option<String>,
    owner_id: i64,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            title: row.title,
            description: row.description,
            owner_id: row.owner_id,
            created_at: row.created_at,
        }
    }
}

fn db_error(context: &str, err: sqlx::Error) -> CoreError {
    CoreError::DatabaseError(format!("{context}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        // Rolled back on drop unless committed
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2",
        )
        .bind(&user.username)
        .bind(&user.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to check existing user", e))?;

        if existing > 0 {
            return Err(CoreError::Conflict(DUPLICATE_USER.to_string()));
        }

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, hashed_password
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!(username = %user.username, "Concurrent registration lost unique constraint race");
                CoreError::Conflict(DUPLICATE_USER.to_string())
            } else {
                db_error("Failed to create user", e)
            }
        })?;

        tx.commit().await.map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(DUPLICATE_USER.to_string())
            } else {
                db_error("Failed to commit user", e)
            }
        })?;

        debug!(user_id = row.id, "User row inserted");
        Ok(row.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch user", e))?;

        Ok(row.map(User::from))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, hashed_password FROM users WHERE username = $1 OR email = $2 ORDER BY id LIMIT 1",
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch user", e))?;

        Ok(row.map(User::from))
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn create_item(&self, item: NewItem) -> Result<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (title, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, owner_id, created_at
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                CoreError::ValidationError(format!("Owner {} does not exist", item.owner_id))
            } else {
                db_error("Failed to create item", e)
            }
        })?;

        Ok(row.into())
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, title, description, owner_id, created_at FROM items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list items", e))?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn find_owned_item(&self, id: i64, owner_id: i64) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, title, description, owner_id, created_at FROM items WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch item", e))?;

        Ok(row.map(Item::from))
    }

    async fn delete_owned_item(&self, id: i64, owner_id: i64) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            DELETE FROM items WHERE id = $1 AND owner_id = $2
            RETURNING id, title, description, owner_id, created_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to delete item", e))?;

        Ok(row.map(Item::from))
    }
}
