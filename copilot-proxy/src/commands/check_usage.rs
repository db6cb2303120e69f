//! `check-usage`: prints the current Copilot usage/quota summary.

use config::Config;
use credentials::TokenManager;
use upstream::UpstreamClient;

use crate::DEVICE_FLOW_CLIENT_ID;

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let store = config.credentials.build_store()?;
    let client = std::sync::Arc::new(UpstreamClient::new(DEVICE_FLOW_CLIENT_ID));
    let (tokens, _) = TokenManager::bootstrap(client.clone(), store).await?;

    let usage = client.usage(&tokens.current_short_token()).await?;
    println!("{}", serde_json::to_string_pretty(&usage)?);

    Ok(())
}
