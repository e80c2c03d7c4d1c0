use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config for {side}: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts { side: &'static str },
    /// Exactly one side uses the `*` wildcard schema scope.
    #[error("If one schema is an asterisk, both must be (source: `{source_scope}`, target: `{target_scope}`)")]
    MixedWildcardScope {
        source_scope: String,
        target_scope: String,
    },
    /// A named schema scope is empty.
    #[error("Schema name for {side} cannot be empty")]
    EmptySchemaName { side: &'static str },
}
