//! Active Directory account state: enable, disable, unlock and password
//! expiration.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::Result;
use crate::router::{Success, created};

pub async fn enable(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Success>)> {
    state.users.enable(&user_id).await?;
    Ok(created(format!("User `{user_id}` enabled.")))
}

pub async fn disable(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Success>)> {
    state.users.disable(&user_id).await?;
    Ok(created(format!("User `{user_id}` disabled.")))
}

pub async fn unlock(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Success>)> {
    state.users.unlock(&user_id).await?;
    Ok(created(format!("User `{user_id}` unlocked.")))
}

pub async fn pw_never_expires(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Success>)> {
    state.users.pw_never_expires(&user_id).await?;
    Ok(created(format!("Password of `{user_id}` never expires.")))
}
