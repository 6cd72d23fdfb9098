//! Users-related HTTP API.
mod account;
mod authenticate;
mod get;
mod groups;
mod password;

use axum::Router;
use axum::routing::{get, post, put};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /users` goes to `list`.
        .route("/", get(get::list))
        // `GET /users/:ID` goes to `get`.
        .route("/{user_id}", get(get::handler))
        .route("/{user_id}/groups", get(groups::list))
        .route("/{user_id}/groups/{group_id}", get(groups::membership))
        .route("/{user_id}/enable", post(account::enable))
        .route("/{user_id}/disable", post(account::disable))
        .route("/{user_id}/unlock", post(account::unlock))
        .route("/{user_id}/pw-never-expires", post(account::pw_never_expires))
        // `PUT /users/:ID/password` goes to `password`.
        .route("/{user_id}/password", put(password::handler))
        .route("/{user_id}/authenticate", post(authenticate::handler))
}
