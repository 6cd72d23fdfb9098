//! HTTP API.
pub mod groups;
pub mod status;
pub mod users;

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::ServerError;

/// JSON body validated with [`validator`].
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Body of successful write operations.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Success {
    pub message: String,
}

/// `201 Created` with a message.
pub fn created(message: impl Into<String>) -> (StatusCode, Json<Success>) {
    (
        StatusCode::CREATED,
        Json(Success {
            message: message.into(),
        }),
    )
}

/// `?filter=` restricting list operations.
#[derive(Debug, Default, Deserialize)]
pub struct Search {
    pub filter: Option<String>,
}

/// `?include_nested=` on membership operations.
#[derive(Debug, Default, Deserialize)]
pub struct Membership {
    #[serde(default, deserialize_with = "truthy")]
    pub include_nested: bool,
}

/// `1` and `true` (any case) are true, everything else is false.
pub fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| is_truthy(value.trim()))
}

/// State on top of an in-memory directory. MUST NEVER be used in production.
#[cfg(test)]
pub fn state(
    directory: &crate::ldap::memory::MemoryDirectory,
    kind: crate::ldap::DirectoryKind,
) -> crate::AppState {
    let mut config =
        crate::config::Configuration::from_yaml(crate::config::tests::CONFIG)
            .expect("test configuration is valid");
    if let Some(ldap) = config.ldap.as_mut() {
        ldap.directory = kind;
    }

    crate::AppState::new(config, std::sync::Arc::new(directory.clone()), None)
        .expect("test state is valid")
}
