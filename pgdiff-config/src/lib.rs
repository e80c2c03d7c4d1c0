//! Configuration for pgdiff: connection settings for both databases, schema scopes and
//! diff behavior, loaded from layered files, environment variables and CLI overrides.

mod environment;
mod load;
pub mod shared;

pub use environment::{ENVIRONMENT_ENV_NAME, Environment};
pub use load::{Config, LoadConfigError, LoadOptions, load_config};
