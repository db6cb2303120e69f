//! Listen address and transport-level toggles for the HTTP surface (§4.J).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind to. `start --host`.
    pub host: String,
    /// Port to bind to. `start --port`.
    pub port: u16,
    /// CORS is open on every route per §4.J; this exists only so an operator can lock it down.
    pub cors_allow_origins: Option<Vec<String>>,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` for outbound upstream requests. `start --proxy-from-env`.
    pub proxy_from_env: bool,
    /// Whether `/v1/messages` passes Anthropic-vendor models straight through (§4.F) instead of
    /// always translating to the OpenAI wire form.
    pub anthropic_direct_passthrough_enabled: bool,
    /// Rewrite server-side tools (`web_search`, `web_fetch`, `code_execution`, `computer`) into
    /// regular custom tools on the direct Anthropic path (§4.F).
    pub rewrite_anthropic_server_tools: bool,
    /// Optional fields accepted on the direct Anthropic pass-through path; any optional field
    /// not named here is dropped before dispatch. `None` accepts every field the wire type
    /// supports (the default, empirically-discovered set).
    pub anthropic_direct_passthrough_allowed_fields: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_allow_origins: None,
            proxy_from_env: false,
            anthropic_direct_passthrough_enabled: true,
            rewrite_anthropic_server_tools: false,
            anthropic_direct_passthrough_allowed_fields: None,
        }
    }
}

impl ServerConfig {
    /// The `host:port` string to bind the HTTP listener to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
