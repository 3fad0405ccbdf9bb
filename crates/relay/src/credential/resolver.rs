// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API key resolution: maps a presented credential onto a token policy.

use std::sync::Arc;

use axum::http::{header, HeaderMap};

use crate::credential::AuthError;
use crate::store::SecretStore;

/// Placeholder some clients send when they must supply *something*.
pub const PLACEHOLDER_CREDENTIAL: &str = "_";

/// How the upstream OAuth credential is chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPolicy {
    /// API key pinned to one token.
    Linked { key_name: String, token_id: String },
    /// API key rotating across all tokens.
    Global { key_name: String },
    /// No keys exist and no credential was sent: use the selected default.
    DefaultToken,
    /// No keys exist and a credential was sent: use it as the OAuth token.
    Passthrough { oauth_credential: String },
}

impl CredentialPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Linked { .. } => "linked",
            Self::Global { .. } => "round-robin",
            Self::DefaultToken => "default",
            Self::Passthrough { .. } => "passthrough",
        }
    }
}

/// Extract the credential from the `Authorization` header.
///
/// Strips a leading `Bearer` or `token` scheme (any case) and surrounding
/// whitespace. Missing or non-UTF-8 headers yield an empty string.
pub fn extract_credential(headers: &HeaderMap) -> String {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return String::new();
    };
    strip_scheme(value).to_owned()
}

fn strip_scheme(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") =>
        {
            rest.trim()
        }
        _ => value,
    }
}

/// Decides which [`CredentialPolicy`] applies to a presented credential.
pub struct ApiKeyResolver {
    store: Arc<dyn SecretStore>,
    allow_legacy_passthrough: bool,
}

impl ApiKeyResolver {
    pub fn new(store: Arc<dyn SecretStore>, allow_legacy_passthrough: bool) -> Self {
        Self { store, allow_legacy_passthrough }
    }

    /// Resolve a normalized credential (see [`extract_credential`]).
    ///
    /// Read-only: safe to call concurrently and repeatedly.
    pub async fn resolve(&self, credential: &str) -> Result<CredentialPolicy, AuthError> {
        // The placeholder is never a usable credential, in any mode.
        if credential == PLACEHOLDER_CREDENTIAL {
            return Err(AuthError::CredentialInvalid);
        }

        let keys = self.store.list_api_keys().await.map_err(AuthError::store)?;

        if keys.is_empty() && self.allow_legacy_passthrough {
            if credential.is_empty() {
                return Ok(CredentialPolicy::DefaultToken);
            }
            return Ok(CredentialPolicy::Passthrough { oauth_credential: credential.to_owned() });
        }

        if credential.is_empty() {
            return Err(AuthError::CredentialMissing { keys_configured: !keys.is_empty() });
        }

        let record = self
            .store
            .find_api_key_by_secret(credential)
            .await
            .map_err(AuthError::store)?
            .ok_or(AuthError::CredentialInvalid)?;

        Ok(match record.linked_token_id {
            Some(token_id) => CredentialPolicy::Linked { key_name: record.name, token_id },
            None => CredentialPolicy::Global { key_name: record.name },
        })
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
