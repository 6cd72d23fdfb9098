//! Groups lookup.

use std::sync::Arc;

use crate::error::Result;
use crate::ldap::filter::membership;
use crate::ldap::{Directory, DirectoryKind, Entry};
use crate::schema::ObjectSchema;
use crate::service::Service;

#[derive(Clone)]
pub struct GroupService {
    groups: Service,
    users: Service,
}

impl GroupService {
    pub fn new(
        directory: Arc<dyn Directory>,
        kind: DirectoryKind,
        root: &str,
        groups: ObjectSchema,
        users: ObjectSchema,
    ) -> Self {
        Self {
            groups: Service::new(Arc::clone(&directory), kind, root, groups, "group"),
            users: Service::new(directory, kind, root, users, "user"),
        }
    }

    pub fn schema(&self) -> &ObjectSchema {
        self.groups.schema()
    }

    pub fn member_schema(&self) -> &ObjectSchema {
        self.users.schema()
    }

    pub async fn get_one(&self, group_id: &str) -> Result<Entry> {
        self.groups.get_one(group_id).await
    }

    pub async fn get_many(&self, filter: Option<&str>) -> Result<Vec<Entry>> {
        self.groups.get_many(filter).await
    }

    /// Users belonging to `group_id`, through nested groups as well when
    /// `include_nested` is set on Active Directory.
    #[tracing::instrument(skip(self))]
    pub async fn get_members(
        &self,
        group_id: &str,
        include_nested: bool,
    ) -> Result<Vec<Entry>> {
        let group = self.get_one(group_id).await?;
        let nested =
            include_nested && self.groups.kind() == DirectoryKind::ActiveDirectory;

        self.users
            .get_many(Some(&membership("memberOf", &group.dn, nested)))
            .await
    }
}
