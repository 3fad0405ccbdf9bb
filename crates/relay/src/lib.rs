// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copilot relay: authenticates API calls with locally issued keys and
//! forwards them upstream with a fresh Copilot bearer token.

pub mod config;
pub mod credential;
pub mod error;
pub mod forward;
pub mod secret;
pub mod state;
pub mod store;
#[doc(hidden)]
pub mod test_support;
pub mod transport;

use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::transport::build_router;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Shared outbound HTTP client. Per-request timeouts are set by callers.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    Ok(reqwest::Client::builder().connect_timeout(Duration::from_secs(10)).build()?)
}

/// Run the relay server until Ctrl-C.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(RelayState::from_config(config)?);

    if state.config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD not set; admin API is unauthenticated");
    }
    tracing::info!(
        upstream = %state.forward.upstream_base,
        api_prefix = %state.forward.api_prefix,
        "copilot-relay listening on {addr}"
    );

    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
