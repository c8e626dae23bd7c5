//! Item API handlers
//!
//! All routes sit behind `require_auth`. Reads and deletes of a single item
//! are scoped to its owner: someone else's item answers 404, exactly like a
//! missing one. Listing is not scoped and returns every item.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::auth::{CurrentUser, MessageResponse};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::HeaderMap,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use itemdesk_core::{Item, NewItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

const ITEM_NOT_FOUND: &str = "Item not found";

/// Item creation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Public item projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
    /// RFC 3339 creation time, set by the server
    pub created_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            title: item.title,
            description: item.description,
            owner_id: item.owner_id,
            created_at: item.created_at,
        }
    }
}

/// Create an item owned by the caller
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "items",
    request_body = CreateItemRequest,
    responses(
        (status = 200, description = "Item created", body = ItemResponse),
        (status = 400, description = "Malformed body", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, AppError> {
    let Json(request) = body?;

    let item = state
        .items
        .create_item(NewItem {
            title: request.title,
            description: request.description,
            owner_id: user.id,
        })
        .await?;

    info!(item_id = item.id, owner_id = user.id, "Item created");
    Ok(Json(item.into()))
}

/// List all items
///
/// Not filtered by owner; any authenticated caller sees every item.
#[utoipa::path(
    get,
    path = "/api/items",
    tag = "items",
    responses(
        (status = 200, description = "All items", body = [ItemResponse]),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ItemResponse>>, AppError> {
    let items = state.items.list_items().await?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// Get one of the caller's items
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item id")
    ),
    responses(
        (status = 200, description = "Item found", body = ItemResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Item absent or owned by someone else", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ItemResponse>, AppError> {
    let Path(id) = id?;

    let item = state
        .items
        .find_owned_item(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;

    Ok(Json(item.into()))
}

/// Delete one of the caller's items
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item id")
    ),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Item absent or owned by someone else", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;

    let item = state
        .items
        .delete_owned_item(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))?;

    audit_log(
        &AuditEvent::ItemDeleted {
            item_id: item.id,
            user_id: user.id,
        },
        &RequestContext::from_headers(&headers),
    );

    Ok(Json(MessageResponse::new("Item deleted")))
}
