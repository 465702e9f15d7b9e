use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::items::model::{Item, ItemInput, ItemList};
use crate::items::store::ItemStore;
use crate::items::ItemError;

pub type SharedStore = Arc<dyn ItemStore>;

fn parse_id(raw: &str) -> Result<u64, ItemError> {
    raw.parse().map_err(|_| ItemError::InvalidId)
}

fn validated(body: Result<Json<ItemInput>, JsonRejection>) -> Result<ItemInput, ItemError> {
    let Json(input) = body.map_err(|e| ItemError::InvalidBody(e.body_text()))?;
    input.validate().map_err(ItemError::Validation)?;
    Ok(input)
}

pub async fn create_item(
    State(store): State<SharedStore>,
    body: Result<Json<ItemInput>, JsonRejection>,
) -> Result<Response, ItemError> {
    let input = validated(body)?;
    let item = store.create(input);
    tracing::info!(id = item.id, name = %item.name, "Created item");
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub async fn list_items(State(store): State<SharedStore>) -> Json<ItemList> {
    let items = store.list();
    let total = items.len();
    Json(ItemList { items, total })
}

pub async fn get_item(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ItemError> {
    let id = parse_id(&id)?;
    store.get(id).map(Json).ok_or(ItemError::NotFound)
}

pub async fn update_item(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    body: Result<Json<ItemInput>, JsonRejection>,
) -> Result<Json<Item>, ItemError> {
    let id = parse_id(&id)?;
    let input = validated(body)?;
    let item = store.update(id, input).ok_or(ItemError::NotFound)?;
    tracing::info!(id, "Updated item");
    Ok(Json(item))
}

pub async fn delete_item(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, ItemError> {
    let id = parse_id(&id)?;
    if !store.delete(id) {
        return Err(ItemError::NotFound);
    }
    tracing::info!(id, "Deleted item");
    Ok(StatusCode::NO_CONTENT)
}
