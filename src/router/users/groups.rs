//! Group memberships of a user.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use crate::error::Result;
use crate::router::Membership;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub is_member: bool,
}

/// Groups the user belongs to.
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<Membership>,
) -> Result<Json<Vec<Value>>> {
    let groups = state
        .users
        .get_groups(&user_id, query.include_nested)
        .await?;
    let schema = state.users.group_schema();

    Ok(Json(groups.iter().map(|group| schema.to_json(group)).collect()))
}

/// Whether the user belongs to one group.
pub async fn membership(
    State(state): State<AppState>,
    Path((user_id, group_id)): Path<(String, String)>,
    Query(query): Query<Membership>,
) -> Result<Json<Response>> {
    let is_member = state
        .users
        .is_member_of(&user_id, &group_id, query.include_nested)
        .await?;

    Ok(Json(Response { is_member }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;
    use crate::ldap::{DirectoryKind, Entry};
    use crate::user::tests::{OPS_DN, directory};
    use crate::*;

    const NESTED: &str = "(&(objectClass=group)(member:1.2.840.113556.1.4.1941:=CN=Jane Doe,OU=Users,DC=example,DC=com))";

    #[tokio::test]
    async fn test_list_nested_groups() {
        let directory = directory();
        directory.on_search(NESTED, vec![Entry::new(OPS_DN).with("cn", &["ops"])]);
        let app = app(router::state(&directory, DirectoryKind::ActiveDirectory));

        let response = make_request(
            app,
            Method::GET,
            "/users/jane/groups?include_nested=TRUE",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["name"], "ops");
    }

    #[tokio::test]
    async fn test_list_groups_without_flag() {
        let directory = directory();
        directory.on_search(NESTED, vec![Entry::new(OPS_DN)]);
        let app = app(router::state(&directory, DirectoryKind::ActiveDirectory));

        let response = make_request(
            app,
            Method::GET,
            "/users/jane/groups?include_nested=no",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_membership() {
        let directory = directory();
        directory.on_search(
            &format!("(memberOf={OPS_DN})"),
            vec![Entry::new("CN=Jane Doe,OU=Users,DC=example,DC=com")],
        );
        let app = app(router::state(&directory, DirectoryKind::Ldap));

        let response = make_request(
            app,
            Method::GET,
            "/users/jane/groups/ops?include_nested=1",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert!(body.is_member);
    }
}
