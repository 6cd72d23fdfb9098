//! In-memory [`Directory`] answering canned searches and recording writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ldap3::{LdapError, LdapResult};

use super::{Directory, Entry, Modification, SearchScope};
use crate::error::Result;

/// Recorded `password_modify` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    pub dn: String,
    pub old_password: Option<String>,
    pub new_password: String,
}

#[derive(Default)]
struct Inner {
    results: HashMap<String, Vec<Entry>>,
    passwords: HashMap<String, String>,
    bind_failures: HashMap<String, u32>,
    searches: Vec<(String, SearchScope, String)>,
    modifications: Vec<(String, Vec<Modification>)>,
    password_changes: Vec<PasswordChange>,
    binds: Vec<String>,
}

/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<Inner>>,
}

pub fn ldap_error(rc: u32, text: &str) -> LdapError {
    LdapError::LdapResult {
        result: LdapResult {
            rc,
            matched: String::new(),
            text: text.to_owned(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        },
    }
}

fn balanced(filter: &str) -> bool {
    let mut depth = 0usize;
    for c in filter.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {},
        }
    }
    depth == 0
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `entries` to any search using exactly `filter`.
    pub fn on_search(&self, filter: &str, entries: Vec<Entry>) -> &Self {
        self.lock().results.insert(filter.to_owned(), entries);
        self
    }

    /// Accept binds of `dn` with `password`.
    pub fn with_password(&self, dn: &str, password: &str) -> &Self {
        self.lock()
            .passwords
            .insert(dn.to_owned(), password.to_owned());
        self
    }

    /// Make every bind of `dn` fail with result code `rc`.
    pub fn fail_bind(&self, dn: &str, rc: u32) -> &Self {
        self.lock().bind_failures.insert(dn.to_owned(), rc);
        self
    }

    pub fn searches(&self) -> Vec<(String, SearchScope, String)> {
        self.lock().searches.clone()
    }

    pub fn modifications(&self) -> Vec<(String, Vec<Modification>)> {
        self.lock().modifications.clone()
    }

    pub fn password_changes(&self) -> Vec<PasswordChange> {
        self.lock().password_changes.clone()
    }

    pub fn binds(&self) -> Vec<String> {
        self.lock().binds.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory directory lock poisoned")
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        _attributes: Vec<String>,
    ) -> Result<Vec<Entry>> {
        // Same client-side check as `ldap3` before anything is sent.
        if !balanced(filter) {
            return Err(LdapError::FilterParsing.into());
        }

        let mut inner = self.lock();
        inner
            .searches
            .push((base.to_owned(), scope, filter.to_owned()));
        Ok(inner.results.get(filter).cloned().unwrap_or_default())
    }

    async fn modify(&self, dn: &str, changes: Vec<Modification>) -> Result<()> {
        self.lock().modifications.push((dn.to_owned(), changes));
        Ok(())
    }

    async fn password_modify(
        &self,
        dn: &str,
        old_password: Option<&str>,
        new_password: &str,
    ) -> Result<()> {
        self.lock().password_changes.push(PasswordChange {
            dn: dn.to_owned(),
            old_password: old_password.map(str::to_owned),
            new_password: new_password.to_owned(),
        });
        Ok(())
    }

    async fn bind(&self, dn: &str, password: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.binds.push(dn.to_owned());

        if let Some(rc) = inner.bind_failures.get(dn) {
            return Err(ldap_error(*rc, "bind refused").into());
        }

        match inner.passwords.get(dn) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(ldap_error(
                super::INVALID_CREDENTIALS,
                "80090308: LdapErr: DSID-0C09042A, comment: AcceptSecurityContext error",
            )
            .into()),
        }
    }
}
