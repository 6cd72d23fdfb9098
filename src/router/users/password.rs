//! Set a user password.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{Success, Valid, created};

#[derive(Debug, Validate, Serialize, Deserialize)]
pub struct Body {
    #[serde(alias = "password")]
    #[validate(length(min = 1, message = "New password cannot be empty."))]
    new_password: String,
    #[validate(length(min = 1, message = "Old password cannot be empty."))]
    old_password: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Success>)> {
    state
        .users
        .set_password(&user_id, &body.new_password, body.old_password.as_deref())
        .await?;

    Ok(created(format!("Password of `{user_id}` updated.")))
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::ldap::DirectoryKind;
    use crate::ldap::encode_ad_password;
    use crate::user::tests::directory;
    use crate::*;

    #[tokio::test]
    async fn test_set_password_handler() {
        let directory = directory();
        let app = app(router::state(&directory, DirectoryKind::ActiveDirectory));

        let response = make_request(
            app,
            Method::PUT,
            "/users/jane/password",
            json!({ "new_password": "S3cure!pass" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let modifications = directory.modifications();
        assert_eq!(modifications.len(), 1);
        assert_eq!(
            modifications[0].1,
            vec![ldap::Modification::Replace {
                attribute: "unicodePwd".into(),
                values: vec![encode_ad_password("S3cure!pass")],
            }]
        );
    }

    #[tokio::test]
    async fn test_set_password_validation() {
        let directory = directory();
        let app = app(router::state(&directory, DirectoryKind::Ldap));

        let response = make_request(
            app,
            Method::PUT,
            "/users/jane/password",
            json!({ "new_password": "" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"][0]["field"], "new_password");
        assert!(directory.password_changes().is_empty());
    }

    #[tokio::test]
    async fn test_set_password_missing_body() {
        let directory = directory();
        let app = app(router::state(&directory, DirectoryKind::Ldap));

        let response =
            make_request(app, Method::PUT, "/users/jane/password", "{}".into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], 400);
        assert!(directory.password_changes().is_empty());
        assert!(directory.modifications().is_empty());
    }
}
