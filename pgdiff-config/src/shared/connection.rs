use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::Config;
use crate::shared::ValidationError;

const CATALOG_DATESTYLE: &str = "ISO";
const CATALOG_CLIENT_ENCODING: &str = "UTF8";
const CATALOG_TIMEZONE: &str = "UTC";

const APP_NAME_CATALOG: &str = "pgdiff";

/// Session options for catalog reads.
///
/// Catalog sessions are read-only and bounded so a slow catalog cannot hang a run.
pub static CATALOG_READ_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: CATALOG_DATESTYLE.to_string(),
        client_encoding: CATALOG_CLIENT_ENCODING.to_string(),
        timezone: CATALOG_TIMEZONE.to_string(),
        statement_timeout: 60_000,
        lock_timeout: 10_000,
        default_transaction_read_only: true,
        application_name: APP_NAME_CATALOG.to_string(),
    });

/// Server-side `-c` settings sent with the startup packet.
#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub client_encoding: String,
    pub timezone: String,
    pub statement_timeout: u32,
    pub lock_timeout: u32,
    pub default_transaction_read_only: bool,
    pub application_name: String,
}

impl PgConnectionOptions {
    /// Returns a space-separated list of `-c key=value` pairs for the `options` parameter.
    pub fn to_options_string(&self) -> String {
        format!(
            "-c datestyle={} -c client_encoding={} -c timezone={} -c statement_timeout={} -c lock_timeout={} -c default_transaction_read_only={} -c application_name={}",
            self.datestyle,
            self.client_encoding,
            self.timezone,
            self.statement_timeout,
            self.lock_timeout,
            if self.default_transaction_read_only {
                "on"
            } else {
                "off"
            },
            self.application_name
        )
    }
}

/// Configuration for connecting to one Postgres database.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the password.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    /// Hostname or IP address of the Postgres server.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the Postgres server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name of the database whose catalog is read.
    pub name: String,
    /// Role used to read the catalog.
    pub username: String,
    /// Password for [`PgConnectionConfig::username`]. Redacted in debug output.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// TLS configuration for the connection.
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
    /// TCP keepalive configuration. When `None`, TCP keepalives are disabled.
    #[serde(default)]
    pub keepalive: Option<TcpKeepaliveConfig>,
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    5432
}

impl PgConnectionConfig {
    /// Validates the connection settings, naming the `side` in errors.
    pub fn validate(&self, side: &'static str) -> Result<(), ValidationError> {
        self.tls.validate(side)
    }
}

impl Config for PgConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

impl fmt::Display for PgConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.name
        )?;

        if self.tls.enabled {
            f.write_str(" (tls)")?;
        }

        Ok(())
    }
}

/// Same as [`PgConnectionConfig`] but without secrets, safe to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgConnectionConfigWithoutSecrets {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub tls: TlsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<TcpKeepaliveConfig>,
}

impl From<PgConnectionConfig> for PgConnectionConfigWithoutSecrets {
    fn from(value: PgConnectionConfig) -> Self {
        PgConnectionConfigWithoutSecrets {
            host: value.host,
            port: value.port,
            name: value.name,
            username: value.username,
            tls: value.tls,
            keepalive: value.keepalive,
        }
    }
}

/// TLS settings for Postgres connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    #[serde(default)]
    pub trusted_root_certs: String,
    /// Whether TLS is enabled for the connection.
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: "".to_string(),
            enabled: false,
        }
    }

    /// Returns [`ValidationError::MissingTrustedRootCerts`] if TLS is enabled without roots.
    pub fn validate(&self, side: &'static str) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts { side });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpKeepaliveConfig {
    pub idle_secs: u64,
    pub interval_secs: u64,
    pub retries: u32,
}

impl Default for TcpKeepaliveConfig {
    fn default() -> Self {
        Self {
            idle_secs: 30,
            interval_secs: 30,
            retries: 3,
        }
    }
}

/// Converts the configuration into crate specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Connect options without a database name.
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> Output;

    /// Connect options including [`PgConnectionConfig::name`].
    fn with_db(&self, options: Option<&PgConnectionOptions>) -> Output;
}

impl IntoConnectOptions<TokioPgConnectOptions> for PgConnectionConfig {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> TokioPgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            TokioPgSslMode::Require
        } else {
            TokioPgSslMode::Prefer
        };
        let mut config = TokioPgConnectOptions::new();
        config
            .host(self.host.clone())
            .port(self.port)
            .user(self.username.clone())
            .ssl_mode(ssl_mode);

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        if let Some(keepalive) = &self.keepalive {
            config
                .keepalives(true)
                .keepalives_idle(Duration::from_secs(keepalive.idle_secs))
                .keepalives_interval(Duration::from_secs(keepalive.interval_secs))
                .keepalives_retries(keepalive.retries);
        }

        if let Some(opts) = options {
            config.options(opts.to_options_string());
        }

        config
    }

    fn with_db(&self, options: Option<&PgConnectionOptions>) -> TokioPgConnectOptions {
        let mut config: TokioPgConnectOptions = self.without_db(options);
        config.dbname(self.name.clone());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_config() -> PgConnectionConfig {
        PgConnectionConfig {
            host: "db1.internal".to_string(),
            port: 5433,
            name: "inventory".to_string(),
            username: "auditor".to_string(),
            password: None,
            tls: TlsConfig::disabled(),
            keepalive: None,
        }
    }

    #[test]
    fn test_catalog_options_string_format() {
        assert_eq!(
            CATALOG_READ_OPTIONS.to_options_string(),
            "-c datestyle=ISO -c client_encoding=UTF8 -c timezone=UTC -c statement_timeout=60000 -c lock_timeout=10000 -c default_transaction_read_only=on -c application_name=pgdiff"
        );
    }

    #[test]
    fn test_tokio_options_carry_database_and_user() {
        let config: TokioPgConnectOptions =
            connection_config().with_db(Some(&*CATALOG_READ_OPTIONS));

        assert_eq!(config.get_dbname(), Some("inventory"));
        assert_eq!(config.get_user(), Some("auditor"));
        assert_eq!(config.get_ports(), &[5433]);
    }

    #[test]
    fn test_display_omits_password() {
        assert_eq!(
            connection_config().to_string(),
            "auditor@db1.internal:5433/inventory"
        );
    }

    #[test]
    fn test_tls_requires_roots() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        assert_eq!(
            tls.validate("source"),
            Err(ValidationError::MissingTrustedRootCerts { side: "source" })
        );
        assert!(TlsConfig::disabled().validate("source").is_ok());
    }
}
