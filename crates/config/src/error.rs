/// Configuration loading and validation failures.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configuration file could not be opened or read.
    #[error("failed to open configuration file: {0}")]
    ConfigOpen(#[from] std::io::Error),
    /// The raw TOML failed to parse.
    #[error("failed to parse configuration file: {0}")]
    ConfigToml(#[from] toml::de::Error),
    /// The parsed TOML did not deserialize into the expected shape.
    #[error("failed to parse configuration file: {0}")]
    ConfigParse(String),
    /// A cross-field invariant (§10.K, e.g. a non-empty recovery step list) was violated.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Substituting a `{{ env.VAR }}` reference failed.
    #[error("at {path} failed substituting environment variable: {reason}")]
    EnvVarSubstitution {
        /// Dotted/indexed path to the offending TOML value.
        path: String,
        /// Reason the substitution failed.
        reason: String,
    },
}
