//! Object schemas: where an object class lives in the tree and which of its
//! attributes are exposed through the API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ldap::Entry;
use crate::ldap::filter::{self, eq};

/// Attribute exposed under an API name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    /// Single-valued shorthand: `email: mail`.
    Attribute(String),
    Detailed {
        attribute: String,
        #[serde(default)]
        multiple: bool,
    },
}

impl Field {
    pub fn attribute(&self) -> &str {
        match self {
            Field::Attribute(attribute) | Field::Detailed { attribute, .. } => {
                attribute
            },
        }
    }

    pub fn multiple(&self) -> bool {
        matches!(self, Field::Detailed { multiple: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Relative to `ldap.base_dn`, e.g. `OU=Users`. Empty means the root.
    #[serde(default)]
    pub base_dn: String,
    pub object_class: String,
    /// Attribute matched against the identifier found in URLs.
    pub id_attribute: String,
    /// Extra filter restricting every search.
    pub filter: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

impl ObjectSchema {
    /// Full search base below `root`.
    pub fn search_base(&self, root: &str) -> String {
        match (self.base_dn.trim(), root.trim()) {
            ("", root) => root.to_owned(),
            (base, "") => base.to_owned(),
            (base, root) => format!("{base},{root}"),
        }
    }

    /// Object class and configured filter, and `clause` when given.
    pub fn filter(&self, clause: Option<&str>) -> String {
        filter::and(
            [
                Some(eq("objectClass", &self.object_class)),
                self.filter.clone(),
                clause.map(str::to_owned),
            ]
            .into_iter()
            .flatten(),
        )
    }

    /// Filter selecting one object by its API identifier.
    pub fn id_filter(&self, id: &str) -> String {
        self.filter(Some(&eq(&self.id_attribute, id)))
    }

    /// Attributes requested on searches.
    pub fn attributes(&self) -> Vec<String> {
        let mut attributes = vec![self.id_attribute.clone()];
        for field in self.fields.values() {
            if !attributes
                .iter()
                .any(|a| a.eq_ignore_ascii_case(field.attribute()))
            {
                attributes.push(field.attribute().to_owned());
            }
        }
        attributes
    }

    /// API representation of `entry`.
    pub fn to_json(&self, entry: &Entry) -> Value {
        let mut object = Map::new();
        object.insert("dn".into(), Value::String(entry.dn.clone()));
        object.insert(
            "id".into(),
            entry
                .first(&self.id_attribute)
                .map(|v| Value::String(v.to_owned()))
                .unwrap_or(Value::Null),
        );

        for (name, field) in &self.fields {
            let value = if field.multiple() {
                Value::Array(
                    entry
                        .values(field.attribute())
                        .unwrap_or_default()
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                )
            } else {
                entry
                    .first(field.attribute())
                    .map(|v| Value::String(v.to_owned()))
                    .unwrap_or(Value::Null)
            };
            object.insert(name.clone(), value);
        }

        Value::Object(object)
    }
}
