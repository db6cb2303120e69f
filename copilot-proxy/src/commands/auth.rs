//! `auth`: runs the device-code flow and persists the resulting long-lived token.

use config::Config;
use secrecy::SecretString;
use upstream::UpstreamClient;
use upstream::device_auth::DeviceCodeResponse;

use crate::DEVICE_FLOW_CLIENT_ID;

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let store = config.credentials.build_store()?;

    if store.read()?.is_some() {
        log::info!("already authorized; run `logout` first to re-authorize");
        return Ok(());
    }

    let client = UpstreamClient::new(DEVICE_FLOW_CLIENT_ID);

    let DeviceCodeResponse { device_code, user_code, verification_uri, interval, .. } = client.request_device_code().await?;

    println!("First, visit {verification_uri} in your browser.");
    println!("Then enter this one-time code: {user_code}");

    let long_lived_token = client.poll_access_token(&device_code, interval).await?;
    store.write(&long_lived_token)?;

    // Confirm the token works before declaring success.
    client.exchange_for_short_token(&SecretString::from(long_lived_token)).await?;

    println!("Authorized. Run `copilot-proxy start` to launch the proxy.");
    Ok(())
}
