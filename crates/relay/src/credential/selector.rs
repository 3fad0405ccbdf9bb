// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream OAuth token selection: linked, round-robin and default policies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::credential::AuthError;
use crate::store::{OAuthTokenRecord, SecretStore};

/// Pick the item at `cursor` (mod length) and return it with the next cursor.
///
/// Returns `None` for an empty list.
pub fn select_next<T>(items: &[T], cursor: usize) -> Option<(&T, usize)> {
    let len = items.len();
    if len == 0 {
        return None;
    }
    let idx = cursor % len;
    items.get(idx).map(|item| (item, (idx + 1) % len))
}

/// Storage for the round-robin position.
///
/// Object-safe so the position can live in memory, in a shared store, or in a
/// test double.
pub trait Cursor: Send + Sync {
    /// Atomically take the position for a list of `len` items and advance it.
    /// Returns the index to use. `len` must be non-zero.
    fn advance(&self, len: usize) -> usize;

    /// Current raw position (for diagnostics).
    fn position(&self) -> usize;
}

/// Process-local cursor; starts at zero on every restart.
#[derive(Debug, Default)]
pub struct AtomicCursor {
    pos: AtomicUsize,
}

impl AtomicCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(pos: usize) -> Self {
        Self { pos: AtomicUsize::new(pos) }
    }
}

impl Cursor for AtomicCursor {
    fn advance(&self, len: usize) -> usize {
        let len = len.max(1);
        let prev = self
            .pos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| Some((cur % len + 1) % len))
            .unwrap_or_else(|cur| cur);
        prev % len
    }

    fn position(&self) -> usize {
        self.pos.load(Ordering::Acquire)
    }
}

/// Chooses the upstream OAuth token for a resolved credential policy.
pub struct TokenSelector {
    store: Arc<dyn SecretStore>,
    cursor: Arc<dyn Cursor>,
}

impl TokenSelector {
    pub fn new(store: Arc<dyn SecretStore>, cursor: Arc<dyn Cursor>) -> Self {
        Self { store, cursor }
    }

    /// Next token in store order, rotating on every call.
    pub async fn select_global(&self) -> Result<OAuthTokenRecord, AuthError> {
        let tokens = self.store.list_oauth_tokens().await.map_err(AuthError::store)?;
        if tokens.is_empty() {
            return Err(AuthError::NoUpstreamTokensConfigured);
        }
        let idx = self.cursor.advance(tokens.len());
        let (token, next) =
            select_next(&tokens, idx).ok_or(AuthError::NoUpstreamTokensConfigured)?;
        tracing::info!(
            token = %token.name,
            round_robin = %format!("{next}/{}", tokens.len()),
            "selected token"
        );
        Ok(token.clone())
    }

    /// The token an API key is pinned to. Never touches the cursor.
    pub async fn select_linked(&self, token_id: &str) -> Result<OAuthTokenRecord, AuthError> {
        self.store
            .find_oauth_token_by_id(token_id)
            .await
            .map_err(AuthError::store)?
            .ok_or_else(|| AuthError::LinkedTokenMissing { token_id: token_id.to_owned() })
    }

    /// The administratively selected token, else the next round-robin token.
    pub async fn select_default_or_global(&self) -> Result<OAuthTokenRecord, AuthError> {
        if let Some(selected) =
            self.store.find_selected_oauth_token().await.map_err(AuthError::store)?
        {
            return Ok(selected);
        }
        self.select_global().await
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
