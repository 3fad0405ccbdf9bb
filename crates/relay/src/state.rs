// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::credential::bearer::{BearerCache, CopilotExchange, TokenExchange};
use crate::credential::pipeline::AuthPipeline;
use crate::credential::resolver::ApiKeyResolver;
use crate::credential::selector::{AtomicCursor, TokenSelector};
use crate::forward::ForwardConfig;
use crate::store::memory::MemoryStore;
use crate::store::SecretStore;

/// Shared relay state.
pub struct RelayState {
    pub config: RelayConfig,
    pub store: Arc<dyn SecretStore>,
    pub pipeline: AuthPipeline,
    pub forward: ForwardConfig,
    /// Client for forwarded API calls.
    pub http: reqwest::Client,
}

impl RelayState {
    /// Wire the credential pipeline over `store` and `exchange`.
    pub fn new(
        config: RelayConfig,
        store: Arc<dyn SecretStore>,
        exchange: Arc<dyn TokenExchange>,
    ) -> anyhow::Result<Self> {
        let forward = config.forward_config()?;
        let pipeline = AuthPipeline::new(
            ApiKeyResolver::new(Arc::clone(&store), config.legacy_passthrough),
            TokenSelector::new(Arc::clone(&store), Arc::new(AtomicCursor::new())),
            Arc::new(BearerCache::new(exchange)),
        );
        Ok(Self { config, store, pipeline, forward, http: crate::http_client()? })
    }

    /// Production wiring: file-backed store and the Copilot token endpoint.
    pub fn from_config(config: RelayConfig) -> anyhow::Result<Self> {
        let store = match config.store_path() {
            Some(path) => MemoryStore::open(path)?,
            None => MemoryStore::new(),
        };
        let exchange = CopilotExchange::new(
            crate::http_client()?,
            config.token_url.clone(),
            config.upstream_header_map()?,
            config.exchange_timeout(),
        );
        Self::new(config, Arc::new(store), Arc::new(exchange))
    }

    pub fn cache(&self) -> &Arc<BearerCache> {
        self.pipeline.cache()
    }
}
