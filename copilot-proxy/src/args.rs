//! Command-line argument tree (§10.L).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "copilot-proxy", version, about = "An OpenAI/Anthropic-compatible proxy in front of GitHub Copilot chat completions")]
pub struct Args {
    /// Path to a TOML configuration file. Missing fields fall back to defaults.
    #[arg(long, env = "COPILOT_PROXY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity. Repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// The `log`/`EnvFilter` directive implied by the verbosity flag count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the device-code flow and persists the resulting token.
    Auth,

    /// Deletes the persisted long-lived token.
    Logout,

    /// Starts the HTTP server.
    Start(StartArgs),

    /// Prints the current Copilot usage/quota summary.
    CheckUsage,

    /// Debug introspection subcommands.
    #[command(subcommand)]
    Debug(DebugCommand),

    /// Patches a third-party CLI's bundled JavaScript to point at this proxy.
    ///
    /// This proxy only emits the standard OpenAI/Anthropic-compatible endpoints; the rest of
    /// the patching process (locating and rewriting the target binary's bundle) is out of
    /// scope and not implemented by this build.
    Patcher {
        /// Path to the third-party client binary or bundle to patch.
        target: PathBuf,
    },
}

#[derive(Debug, Parser)]
pub struct StartArgs {
    /// Host to bind to. Overrides the configuration file.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to. Overrides the configuration file. `0` picks an ephemeral port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Which Copilot account tier to request completions as. Accepted for interface parity
    /// with upstream clients; this build only requests the default tier.
    #[arg(long, default_value = "individual")]
    pub account_type: String,

    /// Require interactive confirmation before each upstream request. Not implemented by this
    /// build (the interactive approval UI is an external collaborator, §1).
    #[arg(long)]
    pub manual_approval: bool,

    /// Minimum seconds between upstream requests before the rate limiter starts backing off.
    /// Overrides `rate_limit.request_interval_secs`.
    #[arg(long)]
    pub rate_limit_secs: Option<u64>,

    /// Block and retry instead of immediately surfacing `429`s to clients while rate-limited.
    #[arg(long)]
    pub wait_on_rate_limit: bool,

    /// Use this bearer token instead of the persisted/refreshed one. Mutually exclusive with
    /// the normal device-code bootstrap.
    #[arg(long)]
    pub token: Option<String>,

    /// Log the current short-lived token at startup (also available at runtime via `GET /token`).
    #[arg(long)]
    pub show_token: bool,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` for outbound upstream requests. Overrides
    /// `server.proxy_from_env`.
    #[arg(long)]
    pub proxy_from_env: bool,

    /// Keep an in-memory ring of recent request/response pairs. Overrides `history.enabled`.
    #[arg(long)]
    pub history: bool,

    /// Maximum number of retained history records; `0` means unlimited. Overrides `history.capacity`.
    #[arg(long)]
    pub history_limit: Option<usize>,

    /// Compact oversized requests against the model's context window before forwarding.
    /// Overrides `compaction.enabled`.
    #[arg(long)]
    pub auto_compact: Option<bool>,
}

#[derive(Debug, Subcommand)]
pub enum DebugCommand {
    /// Prints resolved configuration and credential-store location.
    Info,
    /// Prints the cached model catalog as returned by upstream.
    Models,
}
