//! Check a user password against the directory.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{Success, Valid};

/// An empty password is refused by [`crate::user::UserService::authenticate`].
#[derive(Debug, Validate, Serialize, Deserialize)]
pub struct Body {
    password: String,
}

pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Valid(body): Valid<Body>,
) -> Result<Json<Success>> {
    state.users.authenticate(&user_id, &body.password).await?;

    Ok(Json(Success {
        message: format!("User `{user_id}` authenticated."),
    }))
}
