//! Shared configuration types for pgdiff runs.

mod base;
mod connection;
mod diff;
mod scope;

pub use base::*;
pub use connection::*;
pub use diff::*;
pub use scope::*;
