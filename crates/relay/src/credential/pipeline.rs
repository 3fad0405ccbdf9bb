// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::credential::bearer::BearerCache;
use crate::credential::resolver::{extract_credential, ApiKeyResolver, CredentialPolicy};
use crate::credential::selector::TokenSelector;
use crate::credential::AuthError;
use crate::secret::mask_secret;

/// Upstream bearer token for one forwarded request.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken").field(&mask_secret(&self.0)).finish()
    }
}

/// API key → OAuth credential → bearer token.
pub struct AuthPipeline {
    resolver: ApiKeyResolver,
    selector: TokenSelector,
    cache: Arc<BearerCache>,
}

impl AuthPipeline {
    pub fn new(resolver: ApiKeyResolver, selector: TokenSelector, cache: Arc<BearerCache>) -> Self {
        Self { resolver, selector, cache }
    }

    pub fn cache(&self) -> &Arc<BearerCache> {
        &self.cache
    }

    /// Resolve the request's credential into a bearer token.
    pub async fn ensure_bearer_token(&self, headers: &HeaderMap) -> Result<BearerToken, AuthError> {
        let credential = extract_credential(headers);
        let policy = match self.resolver.resolve(&credential).await {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!(
                    credential = %mask_secret(&credential),
                    err = %e,
                    "rejected credential"
                );
                return Err(e);
            }
        };

        let oauth_credential = match &policy {
            CredentialPolicy::Linked { key_name, token_id } => {
                let token = self.selector.select_linked(token_id).await.inspect_err(|e| {
                    tracing::error!(key = %key_name, token_id = %token_id, err = %e, "bad link");
                })?;
                tracing::info!(key = %key_name, token = %token.name, "using linked token");
                token.secret
            }
            CredentialPolicy::Global { key_name } => {
                let token = self.selector.select_global().await?;
                tracing::debug!(key = %key_name, token = %token.name, "using round-robin token");
                token.secret
            }
            CredentialPolicy::DefaultToken => {
                self.selector.select_default_or_global().await?.secret
            }
            CredentialPolicy::Passthrough { oauth_credential } => oauth_credential.clone(),
        };

        match self.cache.get_bearer_token(&oauth_credential).await {
            Ok(bearer) => Ok(BearerToken(bearer)),
            Err(e) => {
                let err = AuthError::UpstreamExchangeFailed { detail: format!("{e:#}") };
                tracing::error!(
                    policy = policy.label(),
                    credential = %mask_secret(&oauth_credential),
                    err = %err,
                    "bearer token unavailable"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
