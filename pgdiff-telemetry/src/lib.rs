//! Logging setup shared by the pgdiff binary and tests.

pub mod tracing;
