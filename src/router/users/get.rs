//! Get users.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::Value;

use crate::AppState;
use crate::error::Result;
use crate::router::Search;

pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let user = state.users.get_one(&user_id).await?;
    Ok(Json(state.users.schema().to_json(&user)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<Search>,
) -> Result<Json<Vec<Value>>> {
    let users = state.users.get_many(query.filter.as_deref()).await?;
    let schema = state.users.schema();

    Ok(Json(users.iter().map(|user| schema.to_json(user)).collect()))
}
