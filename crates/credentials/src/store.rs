//! Atomic on-disk storage for the long-lived bearer token.
//!
//! The token lives in a single file under an application directory beneath the user's home,
//! mode 0600 on every access path it's written through.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine the user's home directory")]
    NoHomeDirectory,

    #[error("failed to access credential file: {0}")]
    Io(#[from] io::Error),
}

/// Reads, writes, and erases the single opaque token file.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Uses the default application directory: `~/.config/copilot-proxy/credentials`.
    pub fn new() -> Result<Self, StoreError> {
        let mut dir = dirs::home_dir().ok_or(StoreError::NoHomeDirectory)?;
        dir.push(".config");
        dir.push("copilot-proxy");
        Self::at(dir)
    }

    /// Uses a caller-supplied application directory; the credential file is `<dir>/credentials`.
    pub fn at(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("credentials");
        if !path.exists() {
            std::fs::write(&path, "")?;
        }
        enforce_owner_only(&path)?;
        Ok(Self { path })
    }

    /// Returns the stored token, or `None` if the file is empty (not-present).
    pub fn read(&self) -> Result<Option<String>, StoreError> {
        let contents = std::fs::read_to_string(&self.path)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() { Ok(None) } else { Ok(Some(trimmed.to_string())) }
    }

    /// Replaces the stored token.
    pub fn write(&self, token: &str) -> Result<(), StoreError> {
        std::fs::write(&self.path, token)?;
        enforce_owner_only(&self.path)
    }

    /// Removes the credential file. Idempotent if it's already absent.
    pub fn erase(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new().expect("failed to initialize default credential store")
    }
}

#[cfg(unix)]
fn enforce_owner_only(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn enforce_owner_only(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> CredentialStore {
        let dir = std::env::temp_dir().join(format!("copilot-proxy-test-{}", std::process::id()));
        CredentialStore::at(dir).unwrap()
    }

    #[test]
    fn read_reports_not_present_for_empty_file() {
        let store = temp_store();
        assert_eq!(store.read().unwrap(), None);
        store.erase().unwrap();
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = temp_store();
        store.write("token-123").unwrap();
        assert_eq!(store.read().unwrap(), Some("token-123".to_string()));
        store.erase().unwrap();
    }

    #[test]
    fn erase_is_idempotent() {
        let store = temp_store();
        store.erase().unwrap();
        store.erase().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only_after_write() {
        use std::os::unix::fs::PermissionsExt;
        let store = temp_store();
        store.write("token-123").unwrap();
        let mode = std::fs::metadata(&store.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        store.erase().unwrap();
    }
}
