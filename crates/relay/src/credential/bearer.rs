// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-lived bearer tokens obtained by exchanging an OAuth credential.
//!
//! [`BearerCache`] keeps one entry per OAuth credential and only calls the
//! [`TokenExchange`] when the entry is missing or expired. Exchanges for the
//! same credential are single-flight; different credentials never wait on
//! each other.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::secret::mask_secret;
use crate::store::epoch_ms;

/// Boxed future returned by [`TokenExchange::exchange`].
pub type ExchangeFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<ExchangeResponse>> + Send + 'a>>;

/// Turns an OAuth credential into a bearer token.
pub trait TokenExchange: Send + Sync + 'static {
    fn exchange<'a>(&'a self, oauth_credential: &'a str) -> ExchangeFuture<'a>;
}

/// Token endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub token: String,
    pub expires_at: ExpiresAt,
    #[serde(default)]
    pub limited_user_quotas: Option<LimitedUserQuotas>,
    /// Quota reset time in epoch seconds.
    #[serde(default)]
    pub limited_user_reset_date: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitedUserQuotas {
    #[serde(default)]
    pub chat: Option<f64>,
    #[serde(default)]
    pub completions: Option<f64>,
}

/// Expiry as sent by the token endpoint: epoch seconds or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpiresAt {
    Epoch(i64),
    Text(String),
}

impl ExpiresAt {
    /// Expiry in epoch seconds. Times before the epoch clamp to zero.
    pub fn epoch_secs(&self) -> anyhow::Result<u64> {
        let secs = match self {
            Self::Epoch(secs) => *secs,
            Self::Text(text) => match text.trim().parse::<i64>() {
                Ok(secs) => secs,
                Err(_) => chrono::DateTime::parse_from_rfc3339(text.trim())
                    .map_err(|e| anyhow::anyhow!("invalid expires_at {text:?}: {e}"))?
                    .timestamp(),
            },
        };
        Ok(secs.max(0) as u64)
    }
}

/// Cached bearer token plus the quota data that came with it.
#[derive(Clone, PartialEq, Serialize)]
pub struct BearerEntry {
    #[serde(skip)]
    pub bearer: String,
    /// Epoch seconds.
    pub expires_at: u64,
    pub chat_quota: Option<f64>,
    pub completions_quota: Option<f64>,
    /// Epoch seconds.
    pub quota_reset_at: Option<u64>,
    /// Epoch milliseconds of the exchange that produced this entry.
    pub refreshed_at: u64,
}

impl BearerEntry {
    pub fn from_response(resp: ExchangeResponse, refreshed_at: u64) -> anyhow::Result<Self> {
        let quotas = resp.limited_user_quotas.unwrap_or_default();
        Ok(Self {
            expires_at: resp.expires_at.epoch_secs()?,
            bearer: resp.token,
            chat_quota: quotas.chat,
            completions_quota: quotas.completions,
            quota_reset_at: resp.limited_user_reset_date,
            refreshed_at,
        })
    }

    pub fn is_valid_at(&self, now_secs: u64) -> bool {
        now_secs < self.expires_at
    }
}

impl fmt::Debug for BearerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerEntry")
            .field("bearer", &mask_secret(&self.bearer))
            .field("expires_at", &self.expires_at)
            .field("chat_quota", &self.chat_quota)
            .field("completions_quota", &self.completions_quota)
            .field("quota_reset_at", &self.quota_reset_at)
            .field("refreshed_at", &self.refreshed_at)
            .finish()
    }
}

/// Per-credential bearer token cache.
pub struct BearerCache {
    exchange: Arc<dyn TokenExchange>,
    entries: RwLock<HashMap<String, BearerEntry>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BearerCache {
    pub fn new(exchange: Arc<dyn TokenExchange>) -> Self {
        Self { exchange, entries: RwLock::new(HashMap::new()), gates: Mutex::new(HashMap::new()) }
    }

    /// Valid bearer token for `oauth_credential`, exchanging only on a miss.
    pub async fn get_bearer_token(&self, oauth_credential: &str) -> anyhow::Result<String> {
        if let Some(bearer) = self.valid_bearer(oauth_credential).await {
            return Ok(bearer);
        }

        let gate = self.gate(oauth_credential).await;
        let result = {
            let _guard = gate.lock().await;
            // Another caller may have finished the exchange while we waited.
            match self.valid_bearer(oauth_credential).await {
                Some(bearer) => Ok(bearer),
                None => self.exchange_and_store(oauth_credential).await.map(|e| e.bearer),
            }
        };
        self.release_gate(oauth_credential, gate).await;
        result
    }

    /// Force an exchange regardless of the cached entry.
    pub async fn refresh(&self, oauth_credential: &str) -> anyhow::Result<BearerEntry> {
        let gate = self.gate(oauth_credential).await;
        let result = {
            let _guard = gate.lock().await;
            self.exchange_and_store(oauth_credential).await
        };
        self.release_gate(oauth_credential, gate).await;
        result
    }

    /// Cached entry for `oauth_credential`, valid or not.
    pub async fn snapshot(&self, oauth_credential: &str) -> Option<BearerEntry> {
        self.entries.read().await.get(oauth_credential).cloned()
    }

    async fn valid_bearer(&self, oauth_credential: &str) -> Option<String> {
        let now = epoch_ms() / 1000;
        let entries = self.entries.read().await;
        entries.get(oauth_credential).filter(|e| e.is_valid_at(now)).map(|e| e.bearer.clone())
    }

    async fn gate(&self, oauth_credential: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(oauth_credential.to_owned()).or_default())
    }

    /// Drop the gate for `oauth_credential` once no other caller holds it.
    async fn release_gate(&self, oauth_credential: &str, gate: Arc<Mutex<()>>) {
        let mut gates = self.gates.lock().await;
        // One reference lives in the map, the other is `gate`.
        if Arc::strong_count(&gate) == 2 {
            gates.remove(oauth_credential);
        }
    }

    async fn exchange_and_store(&self, oauth_credential: &str) -> anyhow::Result<BearerEntry> {
        let masked = mask_secret(oauth_credential);
        tracing::debug!(credential = %masked, "exchanging oauth credential for bearer token");

        let resp = match self.exchange.exchange(oauth_credential).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(credential = %masked, err = %e, "token exchange failed");
                return Err(e);
            }
        };
        let entry = match BearerEntry::from_response(resp, epoch_ms()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(credential = %masked, err = %e, "unusable token exchange response");
                return Err(e);
            }
        };
        tracing::info!(
            credential = %masked,
            expires_at = entry.expires_at,
            chat_quota = ?entry.chat_quota,
            completions_quota = ?entry.completions_quota,
            "bearer token refreshed"
        );

        self.entries.write().await.insert(oauth_credential.to_owned(), entry.clone());
        Ok(entry)
    }
}

/// [`TokenExchange`] against the Copilot token endpoint.
pub struct CopilotExchange {
    client: reqwest::Client,
    token_url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl CopilotExchange {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Self {
        Self { client, token_url: token_url.into(), headers, timeout }
    }

    async fn fetch(&self, oauth_credential: &str) -> anyhow::Result<ExchangeResponse> {
        let resp = self
            .client
            .get(&self.token_url)
            .headers(self.headers.clone())
            .header(AUTHORIZATION, format!("token {oauth_credential}"))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default();
            let message = format!("Failed to fetch token: {} {reason}", status.as_u16());
            anyhow::bail!("{}", message.trim_end());
        }

        Ok(resp.json().await?)
    }
}

impl TokenExchange for CopilotExchange {
    fn exchange<'a>(&'a self, oauth_credential: &'a str) -> ExchangeFuture<'a> {
        Box::pin(self.fetch(oauth_credential))
    }
}

#[cfg(test)]
#[path = "bearer_tests.rs"]
mod tests;
