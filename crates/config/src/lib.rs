//! Configuration structures mapping the proxy's TOML configuration file.

#![deny(missing_docs)]

mod compaction;
mod credentials;
mod error;
mod history;
mod loader;
mod rate_limit;
mod server;
mod tokenizer;

use std::path::Path;

pub use compaction::CompactionConfig;
pub use credentials::CredentialsConfig;
pub use error::Error;
pub use history::HistoryConfig;
pub use rate_limit::RateLimitConfig;
use serde::Deserialize;
pub use server::ServerConfig;
pub use tokenizer::TokenizerConfig;

/// Root configuration structure for the proxy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Adaptive rate limiter tunables (§4.G).
    pub rate_limit: RateLimitConfig,
    /// Context compactor tunables (§4.E).
    pub compaction: CompactionConfig,
    /// Tokenizer fallback and safety buffer tunables (§4.D).
    pub tokenizer: TokenizerConfig,
    /// Credential storage location (§4.A).
    pub credentials: CredentialsConfig,
    /// In-memory request/response history ring (§3).
    pub history: HistoryConfig,
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        loader::load(path)
    }

    /// Checks cross-field invariants not expressible through `serde` alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.rate_limit.validate()
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                host: "127.0.0.1",
                port: 8080,
                cors_allow_origins: None,
                proxy_from_env: false,
                anthropic_direct_passthrough_enabled: true,
                rewrite_anthropic_server_tools: false,
                anthropic_direct_passthrough_allowed_fields: None,
            },
            rate_limit: RateLimitConfig {
                request_interval_secs: 10,
                backoff_base_secs: 10,
                backoff_cap_secs: 120,
                successes_to_recover: 5,
                recovery_timeout_secs: 600,
                recovery_steps_secs: [
                    5,
                    2,
                    1,
                    0,
                ],
            },
            compaction: CompactionConfig {
                enabled: true,
                safety_margin_percent: 2.0,
                selective_compression_enabled: true,
                preserve_recent_percent: 30.0,
            },
            tokenizer: TokenizerConfig {
                default_tokenizer_name: "o200k_base",
                anthropic_safety_buffer_percent: 5.0,
                default_safety_buffer_percent: 3.0,
            },
            credentials: CredentialsConfig {
                directory: None,
            },
            history: HistoryConfig {
                enabled: false,
                capacity: 100,
            },
        }
        "#);
    }
}
