//! Groups-related HTTP API.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::AppState;
use crate::error::Result;
use crate::router::{Membership, Search};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{group_id}", get(handler))
        .route("/{group_id}/members", get(members))
}

async fn handler(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<Value>> {
    let group = state.groups.get_one(&group_id).await?;
    Ok(Json(state.groups.schema().to_json(&group)))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<Search>,
) -> Result<Json<Vec<Value>>> {
    let groups = state.groups.get_many(query.filter.as_deref()).await?;
    let schema = state.groups.schema();

    Ok(Json(groups.iter().map(|group| schema.to_json(group)).collect()))
}

async fn members(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<Membership>,
) -> Result<Json<Vec<Value>>> {
    let users = state
        .groups
        .get_members(&group_id, query.include_nested)
        .await?;
    let schema = state.groups.member_schema();

    Ok(Json(users.iter().map(|user| schema.to_json(user)).collect()))
}
