//! Types exchanged during the GitHub-style OAuth device-code flow.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub interval: u64,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DeviceCodeRequest<'a> {
    pub client_id: &'a str,
    pub scope: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccessTokenRequest<'a> {
    pub client_id: &'a str,
    pub device_code: &'a str,
    pub grant_type: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum AccessTokenPollResponse {
    Success {
        access_token: String,
    },
    Pending {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

/// Endpoint overrides returned alongside the short-lived token exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamEndpoints {
    pub api: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortTokenResponse {
    pub token: String,
    pub refresh_in: u64,
    #[serde(default)]
    pub endpoints: UpstreamEndpoints,
}
