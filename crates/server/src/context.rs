//! Process-wide application context shared across every request handler.

use std::sync::Arc;
use std::sync::RwLock;

use compactor::DynamicLimitRegistry;
use config::Config;
use credentials::TokenManager;
use ratelimit::RateLimiter;
use upstream::UpstreamClient;
use upstream::model::Model;

use crate::history::HistoryRing;

/// OAuth device-flow client id for the Copilot chat completions API. Public by design: the
/// device-code flow authenticates the end user, not this id.
const DEVICE_FLOW_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";

/// Everything a request handler needs, cheaply cloned via an inner [`Arc`].
#[derive(Clone)]
pub struct AppContext(Arc<Inner>);

struct Inner {
    config: Config,
    client: Arc<UpstreamClient>,
    tokens: Arc<TokenManager>,
    rate_limiter: RateLimiter,
    limits: DynamicLimitRegistry,
    models: RwLock<Vec<Model>>,
    history: Option<HistoryRing>,
}

impl AppContext {
    /// Assembles the context from its already-bootstrapped pieces.
    pub fn new(config: Config, client: Arc<UpstreamClient>, tokens: Arc<TokenManager>, models: Vec<Model>) -> Self {
        let rate_limiter = RateLimiter::new((&config.rate_limit).into());
        let history = config.history.enabled.then(|| HistoryRing::new(config.history.capacity));

        Self(Arc::new(Inner {
            config,
            client,
            tokens,
            rate_limiter,
            limits: DynamicLimitRegistry::new(),
            models: RwLock::new(models),
            history,
        }))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// The upstream HTTP client.
    pub fn client(&self) -> &Arc<UpstreamClient> {
        &self.0.client
    }

    /// The bearer-token manager.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.0.tokens
    }

    /// The adaptive rate limiter guarding outbound upstream calls.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.0.rate_limiter
    }

    /// The byte/token limit registry, refined as upstream error responses come in.
    pub fn limits(&self) -> &DynamicLimitRegistry {
        &self.0.limits
    }

    /// The optional in-memory request/response history ring.
    pub fn history(&self) -> Option<&HistoryRing> {
        self.0.history.as_ref()
    }

    /// Looks up a model's capability descriptor from the cached catalog.
    pub fn model(&self, model_id: &str) -> Option<Model> {
        self.0.models.read().expect("model cache lock poisoned").iter().find(|m| m.id == model_id).cloned()
    }

    /// The full cached model catalog.
    pub fn models(&self) -> Vec<Model> {
        self.0.models.read().expect("model cache lock poisoned").clone()
    }

    /// Replaces the cached model catalog, e.g. after a refresh against `GET /models`.
    pub fn set_models(&self, models: Vec<Model>) {
        *self.0.models.write().expect("model cache lock poisoned") = models;
    }
}

/// Runs the device-code/credential bootstrap and the first model-catalog fetch, then assembles
/// the context and spawns the background token-refresh loop.
pub async fn bootstrap(config: Config) -> anyhow::Result<AppContext> {
    let store = config.credentials.build_store()?;
    let client = Arc::new(UpstreamClient::new(DEVICE_FLOW_CLIENT_ID));

    let (tokens, refresh_in) = TokenManager::bootstrap(client.clone(), store).await?;
    tokio::spawn(tokens.clone().run_refresh_loop(refresh_in));

    let short_token = tokens.current_short_token();
    let models = client.list_models(&short_token).await?;

    Ok(AppContext::new(config, client, tokens, models))
}
