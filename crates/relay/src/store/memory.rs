// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`SecretStore`] with optional JSON file persistence.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::secret::{constant_time_eq, generate_api_key};
use crate::store::persist::{self, PersistedStore};
use crate::store::{epoch_ms, ApiKeyRecord, OAuthTokenRecord, SecretStore, StoreFuture};

#[derive(Debug, Default)]
struct StoreData {
    api_keys: IndexMap<String, ApiKeyRecord>,
    oauth_tokens: IndexMap<String, OAuthTokenRecord>,
    selected_token_id: Option<String>,
}

impl StoreData {
    fn from_persisted(persisted: PersistedStore) -> Self {
        let api_keys = persisted.api_keys.into_iter().map(|k| (k.id.clone(), k)).collect();
        let oauth_tokens: IndexMap<String, OAuthTokenRecord> =
            persisted.oauth_tokens.into_iter().map(|t| (t.id.clone(), t)).collect();
        // Drop a dangling selection rather than carrying it forward.
        let selected_token_id =
            persisted.selected_token_id.filter(|id| oauth_tokens.contains_key(id));
        Self { api_keys, oauth_tokens, selected_token_id }
    }

    fn to_persisted(&self) -> PersistedStore {
        PersistedStore {
            api_keys: self.api_keys.values().cloned().collect(),
            oauth_tokens: self.oauth_tokens.values().cloned().collect(),
            selected_token_id: self.selected_token_id.clone(),
        }
    }
}

/// Secret store held in memory, written through to `path` when persistent.
pub struct MemoryStore {
    data: RwLock<StoreData>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Volatile store; everything is lost on restart.
    pub fn new() -> Self {
        Self { data: RwLock::new(StoreData::default()), path: None }
    }

    /// Open a persistent store at `path`, loading existing records.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let persisted = persist::load(&path)?;
        tracing::info!(
            path = %path.display(),
            api_keys = persisted.api_keys.len(),
            oauth_tokens = persisted.oauth_tokens.len(),
            "loaded secret store"
        );
        Ok(Self { data: RwLock::new(StoreData::from_persisted(persisted)), path: Some(path) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, data: &StoreData) -> anyhow::Result<()> {
        match self.path {
            Some(ref path) => persist::save(path, &data.to_persisted()),
            None => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for MemoryStore {
    fn list_api_keys(&self) -> StoreFuture<'_, Vec<ApiKeyRecord>> {
        Box::pin(async move { Ok(self.data.read().await.api_keys.values().cloned().collect()) })
    }

    fn find_api_key_by_secret<'a>(
        &'a self,
        secret: &'a str,
    ) -> StoreFuture<'a, Option<ApiKeyRecord>> {
        Box::pin(async move {
            let data = self.data.read().await;
            Ok(data.api_keys.values().find(|k| constant_time_eq(&k.secret, secret)).cloned())
        })
    }

    fn create_api_key(
        &self,
        name: String,
        linked_token_id: Option<String>,
    ) -> StoreFuture<'_, ApiKeyRecord> {
        Box::pin(async move {
            let mut data = self.data.write().await;
            let mut secret = generate_api_key();
            while data.api_keys.values().any(|k| k.secret == secret) {
                secret = generate_api_key();
            }
            let record = ApiKeyRecord {
                id: uuid::Uuid::new_v4().to_string(),
                name,
                secret,
                linked_token_id,
                created_at: epoch_ms(),
            };
            data.api_keys.insert(record.id.clone(), record.clone());
            if let Err(e) = self.persist(&data) {
                data.api_keys.shift_remove(&record.id);
                return Err(e);
            }
            Ok(record)
        })
    }

    fn remove_api_key<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut data = self.data.write().await;
            let Some((index, key, record)) = data.api_keys.shift_remove_full(id) else {
                return Ok(false);
            };
            if let Err(e) = self.persist(&data) {
                data.api_keys.shift_insert(index, key, record);
                return Err(e);
            }
            Ok(true)
        })
    }

    fn list_oauth_tokens(&self) -> StoreFuture<'_, Vec<OAuthTokenRecord>> {
        Box::pin(async move { Ok(self.data.read().await.oauth_tokens.values().cloned().collect()) })
    }

    fn find_oauth_token_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> StoreFuture<'a, Option<OAuthTokenRecord>> {
        Box::pin(async move { Ok(self.data.read().await.oauth_tokens.get(id).cloned()) })
    }

    fn find_selected_oauth_token(&self) -> StoreFuture<'_, Option<OAuthTokenRecord>> {
        Box::pin(async move {
            let data = self.data.read().await;
            Ok(data.selected_token_id.as_ref().and_then(|id| data.oauth_tokens.get(id)).cloned())
        })
    }

    fn create_oauth_token(
        &self,
        name: String,
        secret: String,
    ) -> StoreFuture<'_, OAuthTokenRecord> {
        Box::pin(async move {
            let mut data = self.data.write().await;
            let record = OAuthTokenRecord {
                id: uuid::Uuid::new_v4().to_string(),
                name,
                secret,
                created_at: epoch_ms(),
            };
            data.oauth_tokens.insert(record.id.clone(), record.clone());
            if let Err(e) = self.persist(&data) {
                data.oauth_tokens.shift_remove(&record.id);
                return Err(e);
            }
            Ok(record)
        })
    }

    fn remove_oauth_token<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut data = self.data.write().await;
            let Some((index, key, record)) = data.oauth_tokens.shift_remove_full(id) else {
                return Ok(false);
            };
            let previous_selection = data.selected_token_id.clone();
            if previous_selection.as_deref() == Some(id) {
                data.selected_token_id = None;
            }
            if let Err(e) = self.persist(&data) {
                data.oauth_tokens.shift_insert(index, key, record);
                data.selected_token_id = previous_selection;
                return Err(e);
            }
            Ok(true)
        })
    }

    fn select_oauth_token<'a>(&'a self, id: Option<&'a str>) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut data = self.data.write().await;
            if let Some(id) = id {
                if !data.oauth_tokens.contains_key(id) {
                    return Ok(false);
                }
            }
            let previous = std::mem::replace(&mut data.selected_token_id, id.map(str::to_owned));
            if let Err(e) = self.persist(&data) {
                data.selected_token_id = previous;
                return Err(e);
            }
            Ok(true)
        })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
