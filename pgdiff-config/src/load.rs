use std::{
    borrow::Cow,
    fmt, io,
    path::{Path, PathBuf},
};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "PGDIFF";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Identifies which configuration file is currently being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    /// Base configuration shared by every environment.
    Base,
    /// Environment-specific overrides (dev/prod).
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFileKind::Base => Cow::Borrowed("base"),
            ConfigFileKind::Environment(env) => Cow::Owned(env.to_string()),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// An explicitly requested configuration directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// The configuration directory exists but has no base file.
    #[error("could not locate {kind_description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        kind_description: String,
        directory: PathBuf,
        attempted: String,
    },

    /// A configuration file existed but could not be parsed.
    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// An explicit override could not be applied.
    #[error("failed to apply configuration override `{key}`: {source}")]
    Override {
        key: String,
        source: rust_cli_config::ConfigError,
    },

    /// The configuration sources were merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// Failed to determine the runtime environment (`PGDIFF_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    /// Failed to build the merged configuration.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Where configuration is read from and which values are forced on top of it.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding `base.*` and `<environment>.*`.
    ///
    /// When `None`, `./configuration` is used if it exists and skipped otherwise.
    pub directory: Option<PathBuf>,
    /// Dotted-key overrides applied last, e.g. `("source.connection.host", "db1")`.
    pub overrides: Vec<(String, String)>,
}

impl LoadOptions {
    /// Adds an override applied after files and environment variables.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }
}

/// Loads hierarchical configuration from files, environment variables and explicit overrides.
///
/// Sources are layered in this order, later sources winning:
/// `configuration/base.(yaml|yml|json)`, the optional `configuration/{environment}.*` file,
/// `PGDIFF_`-prefixed environment variables (nested keys use `__`, e.g.
/// `PGDIFF_SOURCE__CONNECTION__HOST`), then [`LoadOptions::overrides`].
pub fn load_config<T>(options: &LoadOptions) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let mut builder = rust_cli_config::Config::builder();

    if let Some(configuration_directory) = resolve_configuration_directory(options)? {
        let environment = Environment::load().map_err(LoadConfigError::Environment)?;

        let base_file =
            find_configuration_file(&configuration_directory, ConfigFileKind::Base)?.ok_or_else(
                || missing_file_error(&configuration_directory, ConfigFileKind::Base),
            )?;
        builder = builder.add_source(rust_cli_config::File::from(base_file.clone()));
        validate_configuration_source(&builder, ConfigFileKind::Base, &base_file)?;

        let environment_kind = ConfigFileKind::Environment(environment);
        if let Some(environment_file) =
            find_configuration_file(&configuration_directory, environment_kind)?
        {
            builder = builder.add_source(rust_cli_config::File::from(environment_file.clone()));
            validate_configuration_source(&builder, environment_kind, &environment_file)?;
        }
    }

    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    builder = builder.add_source(environment_source);

    for (key, value) in &options.overrides {
        builder = builder
            .set_override(key.as_str(), value.as_str())
            .map_err(|source| LoadConfigError::Override {
                key: key.clone(),
                source,
            })?;
    }

    let settings = builder.build().map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Returns the configuration directory to read, or `None` when files should be skipped.
fn resolve_configuration_directory(
    options: &LoadOptions,
) -> Result<Option<PathBuf>, LoadConfigError> {
    match &options.directory {
        Some(directory) if directory.is_dir() => Ok(Some(directory.clone())),
        Some(directory) => Err(LoadConfigError::MissingConfigurationDirectory(
            directory.clone(),
        )),
        None => {
            let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
            let configuration_directory = base_path.join(CONFIGURATION_DIR);

            Ok(configuration_directory
                .is_dir()
                .then_some(configuration_directory))
        }
    }
}

/// Finds the configuration file that matches the requested kind and supported extensions.
fn find_configuration_file(
    directory: &Path,
    kind: ConfigFileKind,
) -> Result<Option<PathBuf>, LoadConfigError> {
    let stem = kind.stem();

    for extension in CONFIG_FILE_EXTENSIONS {
        let path = directory.join(format!("{stem}.{extension}"));
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

fn missing_file_error(directory: &Path, kind: ConfigFileKind) -> LoadConfigError {
    let stem = kind.stem();
    let attempted = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| format!("`{}`", directory.join(format!("{stem}.{extension}")).display()))
        .collect::<Vec<_>>()
        .join(", ");

    LoadConfigError::ConfigurationFileMissing {
        kind_description: kind.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    }
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    kind: ConfigFileKind,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: kind.to_string(),
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}
