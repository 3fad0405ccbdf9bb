// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: admin API, health, and the forwarding surface.

pub mod auth;
pub mod http;
pub mod proxy;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/health", get(http::health))
        // API keys
        .route("/admin/api-keys", get(http::list_api_keys).post(http::create_api_key))
        .route("/admin/api-keys/{id}", delete(http::delete_api_key))
        // OAuth tokens
        .route("/admin/tokens", get(http::list_tokens).post(http::create_token))
        .route("/admin/tokens/selected", delete(http::clear_selection))
        .route("/admin/tokens/{id}", delete(http::delete_token))
        .route("/admin/tokens/{id}/select", post(http::select_token))
        .route("/admin/tokens/{id}/refresh", post(http::refresh_token))
        // Everything under the API prefix is forwarded upstream.
        .fallback(proxy::fallback)
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::admin_gate))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
