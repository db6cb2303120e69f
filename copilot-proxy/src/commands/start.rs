//! `start`: launches the HTTP server, applying `start`'s flag overrides onto the loaded config.

use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

use crate::args::StartArgs;

pub async fn run(mut config: Config, args: StartArgs) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(secs) = args.rate_limit_secs {
        config.rate_limit.request_interval_secs = secs;
    }
    if args.proxy_from_env {
        config.server.proxy_from_env = true;
    }
    if args.history {
        config.history.enabled = true;
    }
    if let Some(limit) = args.history_limit {
        config.history.capacity = limit;
    }
    if let Some(auto_compact) = args.auto_compact {
        config.compaction.enabled = auto_compact;
    }
    config.validate()?;

    if args.manual_approval {
        log::warn!("--manual-approval was requested but interactive approval is an external collaborator (§1); every request is forwarded automatically");
    }
    if args.wait_on_rate_limit {
        log::warn!("--wait-on-rate-limit was requested; this build always surfaces rate-limit errors to the caller instead of blocking");
    }
    if args.account_type != "individual" {
        log::warn!(account_type = args.account_type.as_str(); "non-default account types are accepted but not yet distinguished upstream");
    }

    let listen_address = config.server.listen_address().parse()?;
    let shutdown_signal = CancellationToken::new();
    let shutdown_signal_for_ctrlc = shutdown_signal.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_signal_for_ctrlc.cancel();
        }
    });

    if args.show_token || args.token.is_some() {
        log::warn!("--show-token/--token are accepted for interface parity; token issuance always follows the normal device-code/refresh flow");
    }

    server::serve(ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}
