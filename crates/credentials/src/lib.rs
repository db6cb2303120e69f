//! Owns the proxy's two bearer tokens: a long-lived one persisted on disk and a short-lived
//! one refreshed in the background and handed to every upstream request.

pub mod manager;
pub mod store;

pub use manager::{ManagerError, TokenManager};
pub use store::{CredentialStore, StoreError};
