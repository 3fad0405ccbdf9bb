// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forwarding handler for calls under the API prefix.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};

use crate::error::RelayError;
use crate::forward::build_outbound;
use crate::state::RelayState;
use crate::transport::auth::is_exempt;

/// Connection-scoped headers never relayed in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-authenticate",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Fallback route: forwards API-prefixed paths, 404 for everything else.
pub async fn fallback(state: State<Arc<RelayState>>, req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path != "/health" && is_exempt(path, &state.forward.api_prefix) {
        return forward(state, req).await;
    }
    RelayError::NotFound.to_http_response(format!("no route for {path}")).into_response()
}

/// Authorize the call, rewrite it for the upstream, and stream the reply back.
pub async fn forward(State(s): State<Arc<RelayState>>, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();

    let bearer = match s.pipeline.ensure_bearer_token(&parts.headers).await {
        Ok(bearer) => bearer,
        Err(e) => return e.into_response(),
    };

    let bytes = match axum::body::to_bytes(body, s.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(err = %e, "failed to read request body");
            return RelayError::PayloadTooLarge
                .to_http_response("request body too large or unreadable")
                .into_response();
        }
    };

    let outbound = match build_outbound(Request::from_parts(parts, bytes), &bearer, &s.forward) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::error!(err = %e, "failed to build upstream request");
            return RelayError::Internal.to_http_response(e.to_string()).into_response();
        }
    };

    let method = outbound.request.method().clone();
    let mut headers = outbound.headers;
    strip_hop_by_hop(&mut headers);
    let result = s
        .http
        .request(method.clone(), &outbound.target_url)
        .headers(headers)
        .body(outbound.request.into_body())
        .timeout(s.config.upstream_timeout())
        .send()
        .await;

    let resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(
                method = %method,
                path = %outbound.target_path,
                err = %e,
                "upstream unreachable"
            );
            return RelayError::UpstreamError
                .to_http_response(format!("upstream request failed: {e}"))
                .into_response();
        }
    };

    tracing::debug!(
        method = %method,
        path = %outbound.target_path,
        status = resp.status().as_u16(),
        "upstream responded"
    );
    relay_response(resp)
}

fn relay_response(resp: reqwest::Response) -> Response {
    let status = resp.status();
    let mut headers = resp.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut out = Response::new(Body::from_stream(resp.bytes_stream()));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}
