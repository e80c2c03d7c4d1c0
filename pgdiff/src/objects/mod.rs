//! Registry of catalog object kinds.
//!
//! Every kind names a catalog query and the comparator that diffs its rows. Only
//! [`ObjectKind::GrantAttribute`] is implemented. The other kinds are recognised so that asking
//! for them fails loudly instead of producing an empty diff.

pub mod grant_attribute;

use std::fmt;
use std::str::FromStr;

use pgdiff_config::shared::SchemaScope;

use crate::{bail, pgdiff_error};
use crate::catalog::CatalogQuery;
use crate::diff::{Comparator, DiffContext};
use crate::error::{ErrorKind, PgDiffError, PgDiffResult};
use crate::types::CatalogRow;

pub use grant_attribute::GrantAttributeComparator;

/// Name accepted on the command line for "every implemented kind".
pub const ALL_OBJECT_KINDS: &str = "ALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Schema,
    Role,
    Sequence,
    Table,
    TableColumn,
    Column,
    Index,
    View,
    MatView,
    ForeignKey,
    Function,
    Trigger,
    Owner,
    GrantRelationship,
    GrantAttribute,
}

impl ObjectKind {
    /// Every known kind, in the order a full run visits them.
    pub const KNOWN: [ObjectKind; 15] = [
        ObjectKind::Schema,
        ObjectKind::Role,
        ObjectKind::Sequence,
        ObjectKind::Table,
        ObjectKind::TableColumn,
        ObjectKind::Column,
        ObjectKind::Index,
        ObjectKind::View,
        ObjectKind::MatView,
        ObjectKind::ForeignKey,
        ObjectKind::Function,
        ObjectKind::Trigger,
        ObjectKind::Owner,
        ObjectKind::GrantRelationship,
        ObjectKind::GrantAttribute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Schema => "SCHEMA",
            ObjectKind::Role => "ROLE",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Table => "TABLE",
            ObjectKind::TableColumn => "TABLE_COLUMN",
            ObjectKind::Column => "COLUMN",
            ObjectKind::Index => "INDEX",
            ObjectKind::View => "VIEW",
            ObjectKind::MatView => "MATVIEW",
            ObjectKind::ForeignKey => "FOREIGN_KEY",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Owner => "OWNER",
            ObjectKind::GrantRelationship => "GRANT_RELATIONSHIP",
            ObjectKind::GrantAttribute => "GRANT_ATTRIBUTE",
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, ObjectKind::GrantAttribute)
    }

    /// Builds the catalog query reading this kind under `scope`.
    pub fn catalog_query(&self, scope: &SchemaScope) -> PgDiffResult<CatalogQuery> {
        match self {
            ObjectKind::GrantAttribute => Ok(grant_attribute::catalog_query(scope)),
            other => Err(unsupported(*other)),
        }
    }

    /// Sorts `rows` and wraps them in this kind's comparator.
    pub fn comparator(
        &self,
        rows: Vec<CatalogRow>,
        context: &DiffContext,
    ) -> PgDiffResult<Box<dyn Comparator>> {
        match self {
            ObjectKind::GrantAttribute => Ok(Box::new(GrantAttributeComparator::new(
                rows,
                context.clone(),
            ))),
            other => Err(unsupported(*other)),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = PgDiffError;

    /// Parses a kind name case-insensitively. Unknown names are an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();

        match ObjectKind::KNOWN.iter().find(|kind| kind.as_str() == upper) {
            Some(kind) => Ok(*kind),
            None => bail!(
                ErrorKind::UnsupportedObjectKind,
                "Unknown object kind",
                format!("`{s}` is not one of {}", known_names())
            ),
        }
    }
}

/// What a run diffs: every implemented kind or a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSelection {
    All,
    Single(ObjectKind),
}

impl ObjectSelection {
    /// Parses `ALL` or a kind name. Known but unimplemented kinds are rejected.
    pub fn parse(name: &str) -> PgDiffResult<Self> {
        if name.trim().eq_ignore_ascii_case(ALL_OBJECT_KINDS) {
            return Ok(ObjectSelection::All);
        }

        let kind: ObjectKind = name.parse()?;
        if !kind.is_implemented() {
            return Err(unsupported(kind));
        }

        Ok(ObjectSelection::Single(kind))
    }

    /// Kinds to diff, in run order.
    pub fn kinds(&self) -> Vec<ObjectKind> {
        match self {
            ObjectSelection::All => ObjectKind::KNOWN
                .into_iter()
                .filter(ObjectKind::is_implemented)
                .collect(),
            ObjectSelection::Single(kind) => vec![*kind],
        }
    }
}

impl fmt::Display for ObjectSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectSelection::All => f.write_str(ALL_OBJECT_KINDS),
            ObjectSelection::Single(kind) => write!(f, "{kind}"),
        }
    }
}

fn unsupported(kind: ObjectKind) -> PgDiffError {
    pgdiff_error!(
        ErrorKind::UnsupportedObjectKind,
        "Object kind is not supported",
        format!("`{kind}` has no comparator")
    )
}

fn known_names() -> String {
    std::iter::once(ALL_OBJECT_KINDS)
        .chain(ObjectKind::KNOWN.iter().map(ObjectKind::as_str))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_parse_case_insensitively() {
        assert_eq!(
            "grant_attribute".parse::<ObjectKind>().unwrap(),
            ObjectKind::GrantAttribute
        );
        assert_eq!("MatView".parse::<ObjectKind>().unwrap(), ObjectKind::MatView);
    }

    #[test]
    fn selection_accepts_all_and_implemented_kinds() {
        assert_eq!(ObjectSelection::parse("all").unwrap(), ObjectSelection::All);
        assert_eq!(
            ObjectSelection::All.kinds(),
            vec![ObjectKind::GrantAttribute]
        );
        assert_eq!(
            ObjectSelection::parse("GRANT_ATTRIBUTE").unwrap(),
            ObjectSelection::Single(ObjectKind::GrantAttribute)
        );
    }

    #[test]
    fn known_but_unimplemented_kind_is_unsupported() {
        let err = ObjectSelection::parse("trigger").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedObjectKind);
        assert_eq!(err.detail(), Some("`TRIGGER` has no comparator"));
    }

    #[test]
    fn unknown_kind_lists_accepted_names() {
        let err = ObjectSelection::parse("widgets").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedObjectKind);
        assert!(err.detail().unwrap().contains("ALL, SCHEMA, ROLE"));
    }

    #[test]
    fn unimplemented_kinds_have_no_query() {
        let err = ObjectKind::Index
            .catalog_query(&SchemaScope::All)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedObjectKind);
    }
}
