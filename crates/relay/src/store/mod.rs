// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret storage for API keys and upstream OAuth tokens.
//!
//! The credential pipeline only depends on the [`SecretStore`] trait. The
//! shipped implementation is [`memory::MemoryStore`], optionally backed by a
//! JSON file under the state directory.

pub mod memory;
pub mod persist;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future returned by [`SecretStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// A locally issued API key presented by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub name: String,
    pub secret: String,
    /// Pinned OAuth token. `None` means the key rotates across all tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_token_id: Option<String>,
    /// Creation time in epoch milliseconds.
    pub created_at: u64,
}

/// An upstream OAuth credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenRecord {
    pub id: String,
    pub name: String,
    pub secret: String,
    /// Creation time in epoch milliseconds.
    pub created_at: u64,
}

/// Storage for API key and OAuth token records.
///
/// Listing methods return records in the store's natural iteration order,
/// which the round-robin selector relies on. Object-safe for use as
/// `Arc<dyn SecretStore>`.
pub trait SecretStore: Send + Sync + 'static {
    fn list_api_keys(&self) -> StoreFuture<'_, Vec<ApiKeyRecord>>;

    fn find_api_key_by_secret<'a>(&'a self, secret: &'a str)
        -> StoreFuture<'a, Option<ApiKeyRecord>>;

    fn create_api_key(
        &self,
        name: String,
        linked_token_id: Option<String>,
    ) -> StoreFuture<'_, ApiKeyRecord>;

    /// Remove an API key by id. Returns whether a record was removed.
    fn remove_api_key<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool>;

    fn list_oauth_tokens(&self) -> StoreFuture<'_, Vec<OAuthTokenRecord>>;

    fn find_oauth_token_by_id<'a>(&'a self, id: &'a str)
        -> StoreFuture<'a, Option<OAuthTokenRecord>>;

    /// The administratively selected default token, if any.
    fn find_selected_oauth_token(&self) -> StoreFuture<'_, Option<OAuthTokenRecord>>;

    fn create_oauth_token(&self, name: String, secret: String)
        -> StoreFuture<'_, OAuthTokenRecord>;

    /// Remove a token by id, clearing the selection if it pointed at it.
    fn remove_oauth_token<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool>;

    /// Mark a token as the selected default (`None` clears the selection).
    /// Returns `false` when the id does not exist.
    fn select_oauth_token<'a>(&'a self, id: Option<&'a str>) -> StoreFuture<'a, bool>;
}

/// Resolve the state directory for relay data.
///
/// Checks `STORAGE_DIR`, then `$XDG_STATE_HOME/copilot-relay`,
/// then `$HOME/.local/state/copilot-relay`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STORAGE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("copilot-relay");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/copilot-relay");
    }
    PathBuf::from(".storage")
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
