//! LDAP support.
//!
//! [`Directory`] is the seam between services and the network. [`Ldap`] is
//! the real implementation, backed by [`ldap3`].
pub mod filter;
#[cfg(test)]
pub mod memory;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use ldap3::exop::PasswordModify;
use ldap3::{
    Ldap as Ldap3, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope,
    SearchEntry, SearchOptions,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ServerError};

/// `invalidCredentials` result code (RFC 4511).
pub const INVALID_CREDENTIALS: u32 = 49;

/// Directory server flavour. Some operations only exist on Active Directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryKind {
    #[serde(alias = "ad")]
    ActiveDirectory,
    #[default]
    #[serde(alias = "openldap")]
    Ldap,
}

impl DirectoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryKind::ActiveDirectory => "active_directory",
            DirectoryKind::Ldap => "ldap",
        }
    }
}

/// Search scope, mirrors [`ldap3::Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// A directory entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add values to an attribute.
    pub fn with(mut self, attr: &str, values: &[&str]) -> Self {
        self.attrs
            .entry(attr.to_owned())
            .or_default()
            .extend(values.iter().map(|v| v.to_string()));
        self
    }

    /// Every value of `attr`. Attribute names are case-insensitive.
    pub fn values(&self, attr: &str) -> Option<&[String]> {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, values)| values.as_slice())
    }

    /// First value of `attr`.
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.values(attr)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

impl From<SearchEntry> for Entry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

/// One change of an LDAP modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    Add { attribute: String, values: Vec<Vec<u8>> },
    Delete { attribute: String, values: Vec<Vec<u8>> },
    Replace { attribute: String, values: Vec<Vec<u8>> },
}

impl Modification {
    /// Replace every value of `attribute` by a single text value.
    pub fn replace(attribute: &str, value: impl Into<String>) -> Self {
        Modification::Replace {
            attribute: attribute.to_owned(),
            values: vec![value.into().into_bytes()],
        }
    }
}

impl From<Modification> for Mod<Vec<u8>> {
    fn from(modification: Modification) -> Self {
        match modification {
            Modification::Add { attribute, values } => Mod::Add(
                attribute.into_bytes(),
                values.into_iter().collect::<HashSet<_>>(),
            ),
            Modification::Delete { attribute, values } => Mod::Delete(
                attribute.into_bytes(),
                values.into_iter().collect::<HashSet<_>>(),
            ),
            Modification::Replace { attribute, values } => Mod::Replace(
                attribute.into_bytes(),
                values.into_iter().collect::<HashSet<_>>(),
            ),
        }
    }
}

/// Operations the services need from a directory server.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Search entries below `base`.
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<Entry>>;

    /// Apply `changes` on entry `dn`.
    async fn modify(&self, dn: &str, changes: Vec<Modification>) -> Result<()>;

    /// RFC 3062 Password Modify extended operation.
    async fn password_modify(
        &self,
        dn: &str,
        old_password: Option<&str>,
        new_password: &str,
    ) -> Result<()>;

    /// Bind as `dn` on a dedicated connection, then unbind.
    async fn bind(&self, dn: &str, password: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct LdapConfig {
    pub addr: String,
    pub timeout: Duration,
    pub starttls: bool,
    pub tls_verify: bool,
    pub size_limit: Option<i32>,
}

impl LdapConfig {
    /// Create a new [`LdapConfig`].
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();

        let url = Url::parse(&addr).map_err(|err| {
            ServerError::internal(format!("invalid LDAP address `{addr}`"), err)
        })?;
        if !matches!(url.scheme(), "ldap" | "ldaps" | "ldapi") {
            return Err(LdapError::UnknownScheme(url.scheme().to_owned()).into());
        }

        Ok(Self {
            addr,
            timeout: Duration::from_secs(10),
            starttls: false,
            tls_verify: true,
            size_limit: None,
        })
    }

    fn settings(&self) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.starttls)
            .set_no_tls_verify(!self.tls_verify)
    }
}

/// LDAP manager holding the service account connection.
#[derive(Clone, Debug)]
pub struct Ldap {
    conn: Ldap3,
    config: LdapConfig,
}

impl Ldap {
    /// Create a new [`Ldap3`] connection.
    pub async fn connect(
        config: LdapConfig,
        bind_dn: Option<&str>,
        bind_password: Option<&str>,
    ) -> Result<Self> {
        let (handle, mut conn) =
            LdapConnAsync::with_settings(config.settings(), &config.addr).await?;
        ldap3::drive!(handle);

        if let Some(dn) = bind_dn {
            let password = bind_password.ok_or_else(|| {
                ServerError::Config("missing `ldap.password` for the bind user".into())
            })?;

            conn.simple_bind(dn, password).await?.success()?;
            tracing::info!(bind_dn = dn, addr = config.addr, "bound to directory");
        }

        Ok(Self { conn, config })
    }

    fn conn(&self) -> Ldap3 {
        let mut conn = self.conn.clone();
        conn.with_timeout(self.config.timeout);
        conn
    }
}

#[async_trait]
impl Directory for Ldap {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<Entry>> {
        let mut conn = self.conn();
        if let Some(limit) = self.config.size_limit {
            conn.with_search_options(SearchOptions::new().sizelimit(limit));
        }

        tracing::debug!(base, filter, "ldap search");
        let (entries, _) = conn
            .search(base, scope.into(), filter, attributes)
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(Entry::from)
            .collect())
    }

    async fn modify(&self, dn: &str, changes: Vec<Modification>) -> Result<()> {
        let mods = changes.into_iter().map(Mod::from).collect::<Vec<_>>();

        tracing::debug!(dn, count = mods.len(), "ldap modify");
        self.conn().modify(dn, mods).await?.success()?;
        Ok(())
    }

    async fn password_modify(
        &self,
        dn: &str,
        old_password: Option<&str>,
        new_password: &str,
    ) -> Result<()> {
        self.conn()
            .extended(PasswordModify {
                user_id: Some(dn),
                old_pass: old_password,
                new_pass: Some(new_password),
            })
            .await?
            .success()?;
        Ok(())
    }

    /// Test a connection on [`Ldap3`].
    ///
    /// SAFETY: Do not use connection after.
    async fn bind(&self, dn: &str, password: &str) -> Result<()> {
        let (handle, mut conn) =
            LdapConnAsync::with_settings(self.config.settings(), &self.config.addr)
                .await?;
        ldap3::drive!(handle);

        conn.with_timeout(self.config.timeout);
        conn.simple_bind(dn, password).await?.success()?;
        conn.unbind().await?;
        Ok(())
    }
}

/// RFC 4511 name of an LDAP result code.
pub fn result_description(rc: u32) -> &'static str {
    match rc {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        5 => "compareFalse",
        6 => "compareTrue",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        14 => "saslBindInProgress",
        16 => "noSuchAttribute",
        17 => "undefinedAttributeType",
        18 => "inappropriateMatching",
        19 => "constraintViolation",
        20 => "attributeOrValueExists",
        21 => "invalidAttributeSyntax",
        32 => "noSuchObject",
        33 => "aliasProblem",
        34 => "invalidDNSyntax",
        36 => "aliasDereferencingProblem",
        48 => "inappropriateAuthentication",
        INVALID_CREDENTIALS => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        54 => "loopDetect",
        64 => "namingViolation",
        65 => "objectClassViolation",
        66 => "notAllowedOnNonLeaf",
        67 => "notAllowedOnRDN",
        68 => "entryAlreadyExists",
        69 => "objectClassModsProhibited",
        71 => "affectsMultipleDSAs",
        80 => "other",
        _ => "unknown",
    }
}

/// Encode a password for the Active Directory `unicodePwd` attribute:
/// surrounded with double quotes, then UTF-16LE.
pub fn encode_ad_password(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}
