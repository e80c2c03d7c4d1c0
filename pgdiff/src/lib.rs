//! Catalog diff for PostgreSQL.
//!
//! Reads the same catalog object kind from two databases, merges the sorted rows and writes
//! the SQL that would bring the second database in line with the first. Statements are
//! advisory and never executed.

pub mod acl;
pub mod catalog;
pub mod diff;
pub mod error;
mod macros;
pub mod objects;
pub mod session;
pub mod types;

pub use pgdiff_config::shared::{PrivilegeStyle, SchemaScope, StructuralErrorPolicy};
