// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential resolution: API key → OAuth credential → upstream bearer token.
//!
//! [`pipeline::AuthPipeline`] is the single entry point used by the API
//! surface. It runs the [`resolver`], the [`selector`] and the [`bearer`]
//! cache in order and stops at the first [`AuthError`].

pub mod bearer;
pub mod pipeline;
pub mod resolver;
pub mod selector;

use std::fmt;

use axum::response::{IntoResponse, Response};

use crate::error::RelayError;

/// Terminal failure of credential resolution for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential supplied while an API key is required.
    CredentialMissing {
        /// Whether any API key exists at all (changes the operator hint).
        keys_configured: bool,
    },
    /// Unknown API key, or the `_` placeholder.
    CredentialInvalid,
    NoUpstreamTokensConfigured,
    /// An API key points at a token id that no longer exists.
    LinkedTokenMissing { token_id: String },
    UpstreamExchangeFailed { detail: String },
    /// The secret store itself failed.
    Store { detail: String },
}

impl AuthError {
    pub fn code(&self) -> RelayError {
        match self {
            Self::CredentialMissing { .. } | Self::CredentialInvalid => RelayError::Unauthorized,
            Self::NoUpstreamTokensConfigured => RelayError::NoTokens,
            Self::LinkedTokenMissing { .. } => RelayError::Misconfigured,
            Self::UpstreamExchangeFailed { .. } => RelayError::TokenExchangeFailed,
            Self::Store { .. } => RelayError::Internal,
        }
    }

    /// Whether the requester can fix this by sending a different credential.
    pub fn is_client_error(&self) -> bool {
        self.code().http_status() < 500
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        Self::Store { detail: format!("{err:#}") }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CredentialMissing { keys_configured: false } => {
                f.write_str("API key required (no API keys configured)")
            }
            Self::CredentialMissing { keys_configured: true } => f.write_str("API key required"),
            Self::CredentialInvalid => f.write_str("Invalid API key"),
            Self::NoUpstreamTokensConfigured => f.write_str("No tokens configured"),
            Self::LinkedTokenMissing { .. } => f.write_str("Linked token not found"),
            Self::UpstreamExchangeFailed { detail } => {
                write!(f, "Internal server error: {detail}")
            }
            Self::Store { detail } => write!(f, "Secret store unavailable: {detail}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.code().to_http_response(self.to_string()).into_response()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
