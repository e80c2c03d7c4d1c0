use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    PgConnectionConfig, PgConnectionConfigWithoutSecrets, SchemaScope, ValidationError,
};

/// Complete configuration for one diff run.
///
/// `source` is the reference database (db1), `target` is the database the generated
/// statements are meant for (db2).
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct DiffConfig {
    pub source: DatabaseConfig,
    pub target: DatabaseConfig,
    #[serde(default)]
    pub diff: DiffSettings,
}

impl DiffConfig {
    /// Validates both sides and the relationship between their schema scopes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate("source")?;
        self.target.validate("target")?;

        if self.source.schema.is_wildcard() != self.target.schema.is_wildcard() {
            return Err(ValidationError::MixedWildcardScope {
                source_scope: self.source.schema.to_string(),
                target_scope: self.target.schema.to_string(),
            });
        }

        Ok(())
    }
}

impl Config for DiffConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// A database and the schemas of it that are compared.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub connection: PgConnectionConfig,
    /// `*` for every user schema, otherwise a single schema name.
    #[serde(default)]
    pub schema: SchemaScope,
}

impl DatabaseConfig {
    pub fn validate(&self, side: &'static str) -> Result<(), ValidationError> {
        self.connection.validate(side)?;

        if matches!(&self.schema, SchemaScope::Named(name) if name.trim().is_empty()) {
            return Err(ValidationError::EmptySchemaName { side });
        }

        Ok(())
    }

    /// Returns a one-line description without secrets, e.g. `app@db1:5432/sales schema=public`.
    pub fn describe(&self) -> String {
        format!("{} schema={}", self.connection, self.schema)
    }
}

/// Settings that shape the generated output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSettings {
    #[serde(default)]
    pub privilege_style: PrivilegeStyle,
    #[serde(default)]
    pub on_structural_error: StructuralErrorPolicy,
}

/// How permission lists are rendered in GRANT and REVOKE statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeStyle {
    /// Raw ACL codes, e.g. `GRANT r, w (...)`.
    #[default]
    Code,
    /// SQL keywords, e.g. `GRANT SELECT, UPDATE (...)`.
    Keyword,
}

/// What the diff engine does when two comparators cannot be compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralErrorPolicy {
    /// Fail the run.
    #[default]
    Abort,
    /// Write an error comment to the output and keep merging.
    Report,
}

/// Same as [`DiffConfig`] but without secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfigWithoutSecrets {
    pub source: DatabaseConfigWithoutSecrets,
    pub target: DatabaseConfigWithoutSecrets,
    pub diff: DiffSettings,
}

impl From<DiffConfig> for DiffConfigWithoutSecrets {
    fn from(value: DiffConfig) -> Self {
        DiffConfigWithoutSecrets {
            source: value.source.into(),
            target: value.target.into(),
            diff: value.diff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfigWithoutSecrets {
    pub connection: PgConnectionConfigWithoutSecrets,
    pub schema: SchemaScope,
}

impl From<DatabaseConfig> for DatabaseConfigWithoutSecrets {
    fn from(value: DatabaseConfig) -> Self {
        DatabaseConfigWithoutSecrets {
            connection: value.connection.into(),
            schema: value.schema,
        }
    }
}
