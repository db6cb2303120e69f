use std::time::Duration;

use reqwest::Client;

/// Builds the single process-wide HTTP client used for all outbound upstream calls.
///
/// rustls TLS and HTTP/2 come from the workspace `reqwest` feature set; the outbound-proxy
/// environment (`HTTPS_PROXY` etc.) is honored by `reqwest` automatically.
pub fn build_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
        .expect("static TLS/HTTP2 configuration is always valid")
}
