//! User accounts management.

use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::ldap::filter::membership;
use crate::ldap::{
    Directory, DirectoryKind, Entry, INVALID_CREDENTIALS, Modification,
    SearchScope, encode_ad_password,
};
use crate::schema::ObjectSchema;
use crate::service::Service;

/// `userAccountControl` values (NORMAL_ACCOUNT based).
pub const UAC_ENABLE: u32 = 512;
pub const UAC_DISABLE: u32 = 514;
pub const UAC_PW_NEVER_EXPIRES: u32 = 66048;

const USER_ACCOUNT_CONTROL: &str = "userAccountControl";
const LOCKOUT_TIME: &str = "lockoutTime";
const UNICODE_PWD: &str = "unicodePwd";

/// Operations on users.
#[derive(Clone)]
pub struct UserService {
    users: Service,
    groups: Service,
}

impl UserService {
    pub fn new(
        directory: Arc<dyn Directory>,
        kind: DirectoryKind,
        root: &str,
        users: ObjectSchema,
        groups: ObjectSchema,
    ) -> Self {
        Self {
            users: Service::new(Arc::clone(&directory), kind, root, users, "user"),
            groups: Service::new(directory, kind, root, groups, "group"),
        }
    }

    pub fn schema(&self) -> &ObjectSchema {
        self.users.schema()
    }

    pub fn group_schema(&self) -> &ObjectSchema {
        self.groups.schema()
    }

    pub async fn get_one(&self, user_id: &str) -> Result<Entry> {
        self.users.get_one(user_id).await
    }

    pub async fn get_many(&self, filter: Option<&str>) -> Result<Vec<Entry>> {
        self.users.get_many(filter).await
    }

    /// Whether nested memberships are resolved by the server.
    ///
    /// Only Active Directory implements the in-chain matching rule.
    fn nested(&self, include_nested: bool) -> bool {
        match (include_nested, self.users.kind()) {
            (true, DirectoryKind::ActiveDirectory) => true,
            (true, kind) => {
                tracing::debug!(
                    directory = kind.as_str(),
                    "nested membership unsupported, using direct membership"
                );
                false
            },
            (false, _) => false,
        }
    }

    /// Groups `user_id` belongs to.
    #[tracing::instrument(skip(self))]
    pub async fn get_groups(
        &self,
        user_id: &str,
        include_nested: bool,
    ) -> Result<Vec<Entry>> {
        let user = self.get_one(user_id).await?;
        let clause = membership("member", &user.dn, self.nested(include_nested));

        self.groups.get_many(Some(&clause)).await
    }

    /// Whether `user_id` is a member of `group_id`.
    #[tracing::instrument(skip(self))]
    pub async fn is_member_of(
        &self,
        user_id: &str,
        group_id: &str,
        include_nested: bool,
    ) -> Result<bool> {
        let user = self.get_one(user_id).await?;
        let group = self.groups.get_one(group_id).await?;
        let filter =
            membership("memberOf", &group.dn, self.nested(include_nested));

        let entries = self
            .users
            .directory()
            .search(&user.dn, SearchScope::Base, &filter, vec!["1.1".into()])
            .await?;
        Ok(!entries.is_empty())
    }

    /// Check `password` by binding as the user.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, user_id: &str, password: &str) -> Result<()> {
        let user = self.get_one(user_id).await?;

        // An empty simple bind is an anonymous bind and always succeeds.
        if password.is_empty() {
            return Err(invalid_credentials());
        }

        match self.users.directory().bind(&user.dn, password).await {
            Err(err) if err.result_code() == Some(INVALID_CREDENTIALS) => {
                tracing::info!(dn = user.dn, "invalid credentials");
                Err(invalid_credentials())
            },
            result => result,
        }
    }

    /// Set the password of `user_id`, checking `old_password` when given.
    #[tracing::instrument(skip(self, new_password, old_password))]
    pub async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
        old_password: Option<&str>,
    ) -> Result<()> {
        let user = self.get_one(user_id).await?;

        match self.users.kind() {
            DirectoryKind::ActiveDirectory => {
                let new_value = encode_ad_password(new_password);
                let changes = match old_password {
                    Some(old) => vec![
                        Modification::Delete {
                            attribute: UNICODE_PWD.into(),
                            values: vec![encode_ad_password(old)],
                        },
                        Modification::Add {
                            attribute: UNICODE_PWD.into(),
                            values: vec![new_value],
                        },
                    ],
                    None => vec![Modification::Replace {
                        attribute: UNICODE_PWD.into(),
                        values: vec![new_value],
                    }],
                };
                self.users.directory().modify(&user.dn, changes).await
            },
            DirectoryKind::Ldap => {
                self.users
                    .directory()
                    .password_modify(&user.dn, old_password, new_password)
                    .await
            },
        }
    }

    /// Clear an Active Directory lockout.
    #[tracing::instrument(skip(self))]
    pub async fn unlock(&self, user_id: &str) -> Result<()> {
        self.users.require(DirectoryKind::ActiveDirectory)?;
        let user = self.get_one(user_id).await?;

        self.users
            .directory()
            .modify(&user.dn, vec![Modification::replace(LOCKOUT_TIME, "0")])
            .await
    }

    pub async fn pw_never_expires(&self, user_id: &str) -> Result<()> {
        self.set_account_control(user_id, UAC_PW_NEVER_EXPIRES).await
    }

    pub async fn enable(&self, user_id: &str) -> Result<()> {
        self.set_account_control(user_id, UAC_ENABLE).await
    }

    pub async fn disable(&self, user_id: &str) -> Result<()> {
        self.set_account_control(user_id, UAC_DISABLE).await
    }

    #[tracing::instrument(skip(self))]
    async fn set_account_control(&self, user_id: &str, flag: u32) -> Result<()> {
        self.users.require(DirectoryKind::ActiveDirectory)?;
        let user = self.get_one(user_id).await?;

        self.users
            .directory()
            .modify(
                &user.dn,
                vec![Modification::replace(USER_ACCOUNT_CONTROL, flag.to_string())],
            )
            .await?;

        tracing::info!(dn = user.dn, flag, "account control updated");
        Ok(())
    }
}

fn invalid_credentials() -> ServerError {
    ServerError::unauthorized("Invalid username or password")
}
