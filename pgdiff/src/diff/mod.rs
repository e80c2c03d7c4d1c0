//! Sorted-merge diff of two catalogs.
//!
//! A [`Comparator`] wraps the sorted rows of one database. The [`DiffEngine`] walks two of
//! them in lockstep and asks the source side to emit add, drop or change statements.

pub mod comparator;
pub mod engine;
pub mod output;

use pgdiff_config::shared::{DiffConfig, PrivilegeStyle, SchemaScope};

pub use comparator::{Comparator, Cursor};
pub use engine::{DiffEngine, MergeStats};
pub use output::{MergeBranch, OutputLine, Statement, StatementSink, WriterSink};

/// Settings every comparator of a run is built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffContext {
    /// Schema scope of the reference database (db1).
    pub source_scope: SchemaScope,
    /// Schema scope of the database the statements are meant for (db2).
    pub target_scope: SchemaScope,
    pub privilege_style: PrivilegeStyle,
}

impl DiffContext {
    pub fn from_config(config: &DiffConfig) -> Self {
        Self {
            source_scope: config.source.schema.clone(),
            target_scope: config.target.schema.clone(),
            privilege_style: config.diff.privilege_style,
        }
    }
}
