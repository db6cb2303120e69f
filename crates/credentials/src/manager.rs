//! Owns the long-lived and short-lived bearer tokens and keeps the short-lived one fresh.

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use upstream::UpstreamClient;
use upstream::device_auth::DeviceCodeResponse;
use upstream::error::UpstreamError;

use crate::store::{CredentialStore, StoreError};

const REFRESH_RETRY_DELAYS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];
const REFRESH_RETRY_CAP: Duration = Duration::from_secs(30);
/// Used to reschedule after every refresh attempt failed, since there's no fresh `refresh_in`.
const FALLBACK_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("device authorization failed: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Bootstraps and refreshes the pair of bearer tokens the proxy authenticates with upstream.
pub struct TokenManager {
    store: CredentialStore,
    client: Arc<UpstreamClient>,
    short_token: RwLock<SecretString>,
}

impl TokenManager {
    /// Adopts a persisted long-lived token, or runs the device-code flow and persists the result,
    /// then exchanges it for the first short-lived token.
    pub async fn bootstrap(client: Arc<UpstreamClient>, store: CredentialStore) -> Result<(Arc<Self>, u64), ManagerError> {
        let long_lived_token = match store.read()? {
            Some(token) => token,
            None => {
                let token = run_device_code_flow(&client).await?;
                store.write(&token)?;
                token
            }
        };

        let exchange = client.exchange_for_short_token(&SecretString::from(long_lived_token)).await?;

        let manager = Arc::new(Self {
            store,
            client,
            short_token: RwLock::new(SecretString::from(exchange.token)),
        });

        Ok((manager, exchange.refresh_in))
    }

    /// Returns the current short-lived token for the request pipeline to present upstream.
    pub fn current_short_token(&self) -> SecretString {
        self.short_token.read().expect("short token lock poisoned").clone()
    }

    /// Removes the persisted long-lived token. Does not affect the in-memory short-lived token.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.erase()
    }

    /// Runs forever, refreshing the short-lived token `refresh_in - 60s` after each issuance.
    /// Spawn this as a background task; it never returns an error, only logs and keeps going.
    pub async fn run_refresh_loop(self: Arc<Self>, mut refresh_in: u64) {
        loop {
            let delay = Duration::from_secs(refresh_in.saturating_sub(60));
            tokio::time::sleep(delay).await;

            match self.refresh_with_retries().await {
                Some(next_refresh_in) => refresh_in = next_refresh_in,
                None => {
                    log::warn!("short-lived token refresh failed after retries, keeping existing token");
                    refresh_in = FALLBACK_REFRESH_INTERVAL.as_secs() + 60;
                }
            }
        }
    }

    async fn refresh_with_retries(&self) -> Option<u64> {
        let Some(long_lived_token) = self.store.read().ok().flatten() else {
            log::error!("no long-lived token on disk, cannot refresh short-lived token");
            return None;
        };
        let long_lived_token = SecretString::from(long_lived_token);

        for delay in REFRESH_RETRY_DELAYS {
            match self.client.exchange_for_short_token(&long_lived_token).await {
                Ok(exchange) => {
                    *self.short_token.write().expect("short token lock poisoned") = SecretString::from(exchange.token);
                    return Some(exchange.refresh_in);
                }
                Err(err) => {
                    log::warn!("short-lived token refresh attempt failed: {err}");
                    tokio::time::sleep(delay.min(REFRESH_RETRY_CAP)).await;
                }
            }
        }

        None
    }
}

async fn run_device_code_flow(client: &UpstreamClient) -> Result<String, UpstreamError> {
    let DeviceCodeResponse {
        device_code,
        user_code,
        verification_uri,
        interval,
        ..
    } = client.request_device_code().await?;

    log::info!("To authorize this proxy, visit {verification_uri} and enter code {user_code}");

    client.poll_access_token(&device_code, interval).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn refresh_with_retries_returns_none_without_a_stored_long_lived_token() {
        let dir = std::env::temp_dir().join(format!("copilot-proxy-manager-test-{}", std::process::id()));
        let store = CredentialStore::at(dir).unwrap();
        let manager = TokenManager {
            store,
            client: Arc::new(UpstreamClient::new("client-id")),
            short_token: RwLock::new(SecretString::from("placeholder".to_string())),
        };

        assert!(manager.refresh_with_retries().await.is_none());
        manager.store.erase().unwrap();
    }
}
