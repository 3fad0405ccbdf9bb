// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for health and the admin API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::credential::bearer::BearerEntry;
use crate::credential::AuthError;
use crate::error::RelayError;
use crate::secret::mask_secret;
use crate::state::RelayState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_keys: usize,
    pub oauth_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub id: String,
    pub name: String,
    pub masked_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_token_name: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub token_id: Option<String>,
}

/// Returned once at creation; the only response carrying the full key.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedApiKey {
    pub id: String,
    pub name: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_token_id: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    pub name: String,
    pub masked_token: String,
    pub selected: bool,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
    pub token: String,
}

/// Quota snapshot from the last token exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub expires_at: u64,
    pub chat_quota: Option<f64>,
    pub completions_quota: Option<f64>,
    pub quota_reset_at: Option<u64>,
    pub refreshed_at: u64,
}

impl From<BearerEntry> for QuotaInfo {
    fn from(entry: BearerEntry) -> Self {
        Self {
            expires_at: entry.expires_at,
            chat_quota: entry.chat_quota,
            completions_quota: entry.completions_quota,
            quota_reset_at: entry.quota_reset_at,
            refreshed_at: entry.refreshed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: String,
    pub removed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub selected_token_id: Option<String>,
}

fn internal(err: anyhow::Error) -> Response {
    tracing::error!(err = %format!("{err:#}"), "secret store failure");
    RelayError::Internal.to_http_response(format!("{err:#}")).into_response()
}

fn bad_request(message: &str) -> Response {
    RelayError::BadRequest.to_http_response(message).into_response()
}

fn not_found(what: &str, id: &str) -> Response {
    RelayError::NotFound.to_http_response(format!("{what} not found: {id}")).into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /health`
pub async fn health(State(s): State<Arc<RelayState>>) -> Response {
    let api_keys = match s.store.list_api_keys().await {
        Ok(keys) => keys.len(),
        Err(e) => return internal(e),
    };
    let oauth_tokens = match s.store.list_oauth_tokens().await {
        Ok(tokens) => tokens.len(),
        Err(e) => return internal(e),
    };
    Json(HealthResponse { status: "running".to_owned(), api_keys, oauth_tokens }).into_response()
}

/// `GET /admin/api-keys`: masked keys, newest first.
pub async fn list_api_keys(State(s): State<Arc<RelayState>>) -> Response {
    let (keys, tokens) = match (s.store.list_api_keys().await, s.store.list_oauth_tokens().await) {
        (Ok(keys), Ok(tokens)) => (keys, tokens),
        (Err(e), _) | (_, Err(e)) => return internal(e),
    };
    let token_names: HashMap<String, String> =
        tokens.into_iter().map(|t| (t.id, t.name)).collect();

    let mut infos: Vec<ApiKeyInfo> = keys
        .into_iter()
        .map(|k| ApiKeyInfo {
            masked_key: mask_secret(&k.secret),
            linked_token_name: k
                .linked_token_id
                .as_ref()
                .and_then(|id| token_names.get(id))
                .cloned(),
            linked_token_id: k.linked_token_id,
            id: k.id,
            name: k.name,
            created_at: k.created_at,
        })
        .collect();
    infos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(infos).into_response()
}

/// `POST /admin/api-keys`
pub async fn create_api_key(
    State(s): State<Arc<RelayState>>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Response {
    let name = req.name.trim();
    if name.is_empty() {
        return bad_request("name is required");
    }
    let token_id = req.token_id.filter(|id| !id.is_empty());
    if let Some(ref token_id) = token_id {
        match s.store.find_oauth_token_by_id(token_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return bad_request(&format!("unknown token_id: {token_id}")),
            Err(e) => return internal(e),
        }
    }

    match s.store.create_api_key(name.to_owned(), token_id).await {
        Ok(record) => {
            tracing::info!(
                id = %record.id,
                name = %record.name,
                linked = record.linked_token_id.is_some(),
                "api key created"
            );
            let created = CreatedApiKey {
                id: record.id,
                name: record.name,
                key: record.secret,
                linked_token_id: record.linked_token_id,
                created_at: record.created_at,
            };
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => internal(e),
    }
}

/// `DELETE /admin/api-keys/{id}`
pub async fn delete_api_key(State(s): State<Arc<RelayState>>, Path(id): Path<String>) -> Response {
    match s.store.remove_api_key(&id).await {
        Ok(true) => {
            tracing::info!(id = %id, "api key deleted");
            Json(DeleteResponse { id, removed: true }).into_response()
        }
        Ok(false) => not_found("api key", &id),
        Err(e) => internal(e),
    }
}

/// `GET /admin/tokens`: masked tokens with selection flag and cached quota.
pub async fn list_tokens(State(s): State<Arc<RelayState>>) -> Response {
    let tokens = match s.store.list_oauth_tokens().await {
        Ok(tokens) => tokens,
        Err(e) => return internal(e),
    };
    let selected = match s.store.find_selected_oauth_token().await {
        Ok(selected) => selected.map(|t| t.id),
        Err(e) => return internal(e),
    };

    let mut infos = Vec::with_capacity(tokens.len());
    for t in tokens {
        let quota = s.cache().snapshot(&t.secret).await.map(QuotaInfo::from);
        infos.push(TokenInfo {
            selected: selected.as_deref() == Some(t.id.as_str()),
            masked_token: mask_secret(&t.secret),
            id: t.id,
            name: t.name,
            created_at: t.created_at,
            quota,
        });
    }
    Json(infos).into_response()
}

/// `POST /admin/tokens`
pub async fn create_token(
    State(s): State<Arc<RelayState>>,
    Json(req): Json<CreateTokenRequest>,
) -> Response {
    let name = req.name.trim();
    let token = req.token.trim();
    if name.is_empty() || token.is_empty() {
        return bad_request("name and token are required");
    }

    match s.store.create_oauth_token(name.to_owned(), token.to_owned()).await {
        Ok(record) => {
            tracing::info!(id = %record.id, name = %record.name, "oauth token added");
            let info = TokenInfo {
                masked_token: mask_secret(&record.secret),
                id: record.id,
                name: record.name,
                selected: false,
                created_at: record.created_at,
                quota: None,
            };
            (StatusCode::CREATED, Json(info)).into_response()
        }
        Err(e) => internal(e),
    }
}

/// `DELETE /admin/tokens/{id}`
pub async fn delete_token(State(s): State<Arc<RelayState>>, Path(id): Path<String>) -> Response {
    match s.store.remove_oauth_token(&id).await {
        Ok(true) => {
            tracing::info!(id = %id, "oauth token deleted");
            Json(DeleteResponse { id, removed: true }).into_response()
        }
        Ok(false) => not_found("token", &id),
        Err(e) => internal(e),
    }
}

/// `POST /admin/tokens/{id}/select`
pub async fn select_token(State(s): State<Arc<RelayState>>, Path(id): Path<String>) -> Response {
    match s.store.select_oauth_token(Some(id.as_str())).await {
        Ok(true) => {
            tracing::info!(id = %id, "default token selected");
            Json(SelectionResponse { selected_token_id: Some(id) }).into_response()
        }
        Ok(false) => not_found("token", &id),
        Err(e) => internal(e),
    }
}

/// `DELETE /admin/tokens/selected`
pub async fn clear_selection(State(s): State<Arc<RelayState>>) -> Response {
    match s.store.select_oauth_token(None).await {
        Ok(_) => Json(SelectionResponse { selected_token_id: None }).into_response(),
        Err(e) => internal(e),
    }
}

/// `POST /admin/tokens/{id}/refresh`: force an exchange and report quota.
pub async fn refresh_token(State(s): State<Arc<RelayState>>, Path(id): Path<String>) -> Response {
    let token = match s.store.find_oauth_token_by_id(&id).await {
        Ok(Some(token)) => token,
        Ok(None) => return not_found("token", &id),
        Err(e) => return internal(e),
    };

    match s.cache().refresh(&token.secret).await {
        Ok(entry) => Json(QuotaInfo::from(entry)).into_response(),
        Err(e) => AuthError::UpstreamExchangeFailed { detail: format!("{e:#}") }.into_response(),
    }
}
