//! `debug info|models`: resolved configuration and upstream model catalog introspection.

use config::Config;
use credentials::TokenManager;
use upstream::UpstreamClient;

use crate::DEVICE_FLOW_CLIENT_ID;
use crate::args::DebugCommand;

pub async fn run(config: &Config, command: &DebugCommand) -> anyhow::Result<()> {
    match command {
        DebugCommand::Info => info(config),
        DebugCommand::Models => models(config).await,
    }
}

fn info(config: &Config) -> anyhow::Result<()> {
    let store = config.credentials.build_store()?;
    let authorized = store.read()?.is_some();

    println!("listen address:  {}", config.server.listen_address());
    println!("anthropic direct passthrough: {}", config.server.anthropic_direct_passthrough_enabled);
    println!("proxy from env:  {}", config.server.proxy_from_env);
    println!("history enabled: {} (capacity {})", config.history.enabled, config.history.capacity);
    println!("auto-compact:    {}", config.compaction.enabled);
    println!("authorized:      {authorized}");

    Ok(())
}

async fn models(config: &Config) -> anyhow::Result<()> {
    let store = config.credentials.build_store()?;
    let client = std::sync::Arc::new(UpstreamClient::new(DEVICE_FLOW_CLIENT_ID));
    let (tokens, _) = TokenManager::bootstrap(client.clone(), store).await?;

    let models = client.list_models(&tokens.current_short_token()).await?;
    println!("{}", serde_json::to_string_pretty(&models)?);

    Ok(())
}
