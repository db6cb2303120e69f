//! Where the long-lived bearer token is persisted (§3, §6).

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Overrides the default `~/.config/copilot-proxy` application directory.
    pub directory: Option<PathBuf>,
}

impl CredentialsConfig {
    /// Builds the [`credentials::CredentialStore`] rooted at the configured directory, or the
    /// default application directory if none was set.
    pub fn build_store(&self) -> Result<credentials::CredentialStore, credentials::StoreError> {
        match &self.directory {
            Some(dir) => credentials::CredentialStore::at(dir.clone()),
            None => credentials::CredentialStore::new(),
        }
    }
}
