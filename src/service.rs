//! Plumbing shared by [`crate::user::UserService`] and
//! [`crate::group::GroupService`].

use std::sync::Arc;

use ldap3::LdapError;

use crate::error::{Result, ServerError};
use crate::ldap::{Directory, DirectoryKind, Entry, SearchScope};
use crate::schema::ObjectSchema;

/// Handle on the directory for one object schema.
#[derive(Clone)]
pub struct Service {
    directory: Arc<dyn Directory>,
    kind: DirectoryKind,
    root: String,
    schema: Arc<ObjectSchema>,
    name: &'static str,
}

impl Service {
    pub fn new(
        directory: Arc<dyn Directory>,
        kind: DirectoryKind,
        root: impl Into<String>,
        schema: ObjectSchema,
        name: &'static str,
    ) -> Self {
        Self {
            directory,
            kind,
            root: root.into(),
            schema: Arc::new(schema),
            name,
        }
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    pub fn kind(&self) -> DirectoryKind {
        self.kind
    }

    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Fail unless the directory is `kind`.
    pub fn require(&self, kind: DirectoryKind) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(ServerError::application(format!(
                "operation requires a `{}` directory, configured is `{}`",
                kind.as_str(),
                self.kind.as_str()
            )))
        }
    }

    /// Search with `filter` below the schema base.
    pub async fn search(&self, filter: &str) -> Result<Vec<Entry>> {
        self.directory
            .search(
                &self.schema.search_base(&self.root),
                SearchScope::Subtree,
                filter,
                self.schema.attributes(),
            )
            .await
    }

    /// The only object whose identifier is `id`.
    pub async fn get_one(&self, id: &str) -> Result<Entry> {
        let mut entries = self.search(&self.schema.id_filter(id)).await?;

        match entries.len() {
            0 => Err(ServerError::not_found(self.name, id)),
            1 => Ok(entries.remove(0)),
            count => {
                tracing::warn!(id, count, kind = self.name, "identifier is not unique");
                Err(ServerError::application(format!(
                    "{count} {}s match `{id}`",
                    self.name
                )))
            },
        }
    }

    /// Every object, restricted by `filter` when given.
    pub async fn get_many(&self, filter: Option<&str>) -> Result<Vec<Entry>> {
        self.search(&self.schema.filter(filter))
            .await
            .map_err(|err| match err {
                ServerError::Ldap(LdapError::FilterParsing) => ServerError::application(
                    format!("invalid filter `{}`", filter.unwrap_or_default()),
                ),
                err => err,
            })
    }
}
