use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema name that selects every user schema.
pub const WILDCARD_SCHEMA: &str = "*";

/// Which schemas of a database take part in a diff.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaScope {
    /// Every schema except `pg_*` and `information_schema`.
    #[default]
    All,
    /// A single named schema.
    Named(String),
}

impl SchemaScope {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, SchemaScope::All)
    }

    /// Returns the schema name, or `None` for the wildcard scope.
    pub fn name(&self) -> Option<&str> {
        match self {
            SchemaScope::All => None,
            SchemaScope::Named(name) => Some(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SchemaScope::All => WILDCARD_SCHEMA,
            SchemaScope::Named(name) => name,
        }
    }
}

impl From<String> for SchemaScope {
    fn from(value: String) -> Self {
        if value == WILDCARD_SCHEMA {
            SchemaScope::All
        } else {
            SchemaScope::Named(value)
        }
    }
}

impl From<&str> for SchemaScope {
    fn from(value: &str) -> Self {
        SchemaScope::from(value.to_string())
    }
}

impl From<SchemaScope> for String {
    fn from(value: SchemaScope) -> Self {
        match value {
            SchemaScope::All => WILDCARD_SCHEMA.to_string(),
            SchemaScope::Named(name) => name,
        }
    }
}

impl fmt::Display for SchemaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asterisk_maps_to_wildcard() {
        assert_eq!(SchemaScope::from("*"), SchemaScope::All);
        assert!(SchemaScope::from("*").is_wildcard());
        assert_eq!(
            SchemaScope::from("public"),
            SchemaScope::Named("public".to_string())
        );
    }

    #[test]
    fn scope_serializes_as_plain_string() {
        let json = serde_json::to_string(&SchemaScope::All).unwrap();
        assert_eq!(json, "\"*\"");

        let scope: SchemaScope = serde_json::from_str("\"sales\"").unwrap();
        assert_eq!(scope.name(), Some("sales"));
    }
}
