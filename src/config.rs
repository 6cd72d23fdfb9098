//! Configuration manager for redap.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::ldap::{DirectoryKind, LdapConfig};
use crate::schema::ObjectSchema;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Environment variable overriding `ldap.password`.
pub const LDAP_PASSWORD_ENV: &str = "LDAP_PASSWORD";

/// Errors that may occur during the configuration loading process.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[from] serde_yaml::Error),
    #[error("cannot open `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("missing `{0}` entry in configuration")]
    Missing(&'static str),
    #[error("invalid `{field}` entry: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Socket address to listen on.
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    version: String,
    /// Related to LDAP3 configuration.
    #[serde(skip_serializing)]
    pub ldap: Option<Ldap>,
    /// Where users live and what is exposed of them.
    #[serde(skip_serializing)]
    pub users: Option<ObjectSchema>,
    /// Where groups live and what is exposed of them.
    #[serde(skip_serializing)]
    pub groups: Option<ObjectSchema>,
    #[serde(default, skip_serializing)]
    pub telemetry: Telemetry,
}

fn default_name() -> String {
    env!("CARGO_PKG_NAME").to_owned()
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_owned()
}

fn default_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// LDAP configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ldap {
    /// `ldap://`, `ldaps://` or `ldapi://` URL of the directory server.
    pub address: String,
    /// Service account DN.
    pub user: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// DN for domain.
    pub base_dn: String,
    #[serde(default, alias = "type")]
    pub directory: DirectoryKind,
    /// Operation timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    /// Maximum number of entries returned by a search.
    pub size_limit: Option<i32>,
}

impl Ldap {
    /// Connection settings for [`crate::ldap::Ldap`].
    pub fn connection(&self) -> crate::error::Result<LdapConfig> {
        let mut config = LdapConfig::new(&self.address)?;
        config.timeout = Duration::from_secs(self.timeout);
        config.starttls = self.starttls;
        config.tls_verify = self.tls_verify;
        config.size_limit = self.size_limit;
        Ok(config)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Expose Prometheus metrics on `/metrics`.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self { metrics: true }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: default_name(),
            address: default_address(),
            version: VERSION.to_owned(),
            ldap: None,
            users: None,
            groups: None,
            telemetry: Telemetry::default(),
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    /// Reads the configuration file from `path` or the default location.
    pub fn read(path: Option<PathBuf>) -> Result<Self, Error> {
        let path =
            path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH).to_path_buf());

        let file = File::open(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let mut config: Configuration = serde_yaml::from_reader(file)?;
        config.finish(std::env::var(LDAP_PASSWORD_ENV).ok())?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse a YAML document.
    pub fn from_yaml(document: &str) -> Result<Self, Error> {
        let mut config: Configuration = serde_yaml::from_str(document)?;
        config.finish(std::env::var(LDAP_PASSWORD_ENV).ok())?;
        Ok(config)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Set version, apply the `LDAP_PASSWORD` override and check required
    /// entries.
    fn finish(&mut self, ldap_password: Option<String>) -> Result<(), Error> {
        self.version = VERSION.to_owned();

        let ldap = self.ldap.as_mut().ok_or(Error::Missing("ldap"))?;
        if let Some(password) = ldap_password {
            ldap.password = Some(password);
        }
        if ldap.user.is_some() && ldap.password.is_none() {
            return Err(Error::Missing("ldap.password"));
        }
        ldap.connection().map_err(|err| Error::Invalid {
            field: "ldap.address",
            reason: err.to_string(),
        })?;

        for (field, schema) in [("users", &self.users), ("groups", &self.groups)] {
            let schema = schema.as_ref().ok_or(Error::Missing(field))?;
            if schema.id_attribute.trim().is_empty() {
                return Err(Error::Invalid {
                    field,
                    reason: "`id_attribute` cannot be empty".into(),
                });
            }
        }

        self.address
            .parse::<std::net::SocketAddr>()
            .map_err(|err| Error::Invalid {
                field: "address",
                reason: err.to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const CONFIG: &str = r#"
name: redap
address: 127.0.0.1:8080
ldap:
  address: ldaps://dc.example.com:636
  user: CN=svc,OU=Service,DC=example,DC=com
  password: secret
  base_dn: DC=example,DC=com
  directory: active_directory
users:
  base_dn: OU=Users
  object_class: user
  id_attribute: sAMAccountName
  fields:
    username: sAMAccountName
    email: mail
groups:
  base_dn: OU=Groups
  object_class: group
  id_attribute: cn
  fields:
    name: cn
    description: description
"#;

    #[test]
    fn test_read_yaml() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        let ldap = config.ldap.as_ref().unwrap();

        assert_eq!(config.version(), VERSION);
        assert_eq!(ldap.directory, DirectoryKind::ActiveDirectory);
        assert_eq!(ldap.timeout, 10);
        assert!(ldap.tls_verify);
        assert!(config.telemetry.metrics);
        assert_eq!(config.users.unwrap().id_attribute, "sAMAccountName");
    }

    #[test]
    fn test_missing_sections() {
        let err = Configuration::from_yaml("name: redap").unwrap_err();
        assert!(matches!(err, Error::Missing("ldap")));

        let document = CONFIG.replace("groups:", "others:");
        let err = Configuration::from_yaml(&document).unwrap_err();
        assert!(matches!(err, Error::Missing("groups")));
    }

    #[test]
    fn test_invalid_address() {
        let document = CONFIG.replace("ldaps://dc.example.com:636", "https://dc");
        let err = Configuration::from_yaml(&document).unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "ldap.address", .. }));

        let document = CONFIG.replace("127.0.0.1:8080", "localhost");
        let err = Configuration::from_yaml(&document).unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "address", .. }));
    }

    #[test]
    fn test_ldap_password_override() {
        let mut config: Configuration = serde_yaml::from_str(CONFIG).unwrap();
        config.finish(Some("from-env".into())).unwrap();
        assert_eq!(config.ldap.unwrap().password.as_deref(), Some("from-env"));

        let document = CONFIG.replace("  password: secret\n", "");
        let mut config: Configuration = serde_yaml::from_str(&document).unwrap();
        let err = config.finish(None).unwrap_err();
        assert!(matches!(err, Error::Missing("ldap.password")));

        let mut config: Configuration = serde_yaml::from_str(&document).unwrap();
        config.finish(Some("from-env".into())).unwrap();
        assert_eq!(config.ldap.unwrap().password.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_directory_alias() {
        let document = CONFIG.replace("directory: active_directory", "type: openldap");
        let config = Configuration::from_yaml(&document).unwrap();
        assert_eq!(config.ldap.unwrap().directory, DirectoryKind::Ldap);
    }
}
