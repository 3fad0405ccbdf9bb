// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for unit and integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::credential::bearer::{ExchangeFuture, ExchangeResponse, ExpiresAt, TokenExchange};
use crate::state::RelayState;
use crate::store::memory::MemoryStore;
use crate::store::{epoch_ms, SecretStore};

/// Token exchange double. Mints `bearer-for-<credential>` valid for `ttl_secs`
/// and records every credential it is asked to exchange.
pub struct CountingExchange {
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
    ttl_secs: i64,
    fail_with: Option<String>,
}

impl CountingExchange {
    pub fn new() -> Self {
        Self::with_ttl(1800)
    }

    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self { calls: AtomicU32::new(0), seen: Mutex::new(Vec::new()), ttl_secs, fail_with: None }
    }

    /// Exchange double whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { fail_with: Some(message.into()), ..Self::new() }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for CountingExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenExchange for CountingExchange {
    fn exchange<'a>(&'a self, oauth_credential: &'a str) -> ExchangeFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(oauth_credential.to_owned());
            }
            if let Some(message) = &self.fail_with {
                anyhow::bail!("{message}");
            }
            Ok(ExchangeResponse {
                token: format!("bearer-for-{oauth_credential}"),
                expires_at: ExpiresAt::Epoch((epoch_ms() / 1000) as i64 + self.ttl_secs),
                limited_user_quotas: None,
                limited_user_reset_date: None,
            })
        })
    }
}

/// Relay state over an in-memory store and the given exchange double.
pub fn test_state(
    config: RelayConfig,
    exchange: Arc<dyn TokenExchange>,
) -> anyhow::Result<(Arc<RelayState>, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let state =
        RelayState::new(config, Arc::clone(&store) as Arc<dyn SecretStore>, exchange)?;
    Ok((Arc::new(state), store))
}

/// Serve `app` on an ephemeral localhost port.
pub async fn serve_ephemeral(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
