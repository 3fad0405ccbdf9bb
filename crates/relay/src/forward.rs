// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the upstream request for an authorized inbound API call.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap, HeaderValue, Request};
use bytes::Bytes;

use crate::credential::pipeline::BearerToken;
use crate::secret::mask_authorization;

/// Where and how API calls are forwarded.
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Inbound path prefix removed before forwarding (e.g. `/api`).
    pub api_prefix: String,
    /// Upstream base URL without a trailing slash.
    pub upstream_base: String,
    /// Value for the outbound `host` header.
    pub upstream_host: String,
    /// Headers overlaid on every forwarded request.
    pub headers: HeaderMap,
}

/// A forwarded request ready to send.
#[derive(Debug)]
pub struct OutboundRequest {
    pub target_url: String,
    /// Inbound path with the API prefix removed.
    pub target_path: String,
    pub headers: HeaderMap,
    /// Parsed JSON body, for diagnostics only.
    pub body_json: Option<serde_json::Value>,
    /// The inbound request, untouched.
    pub request: Request<Bytes>,
}

/// Strip `prefix` from `path` at a segment boundary.
///
/// `/api/chat` → `/chat`, `/api` → `/`, `/apix` is left alone.
pub fn strip_api_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    match path.strip_prefix(prefix) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Header map rendered for logging, with credentials masked.
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes());
            let value = if name == header::AUTHORIZATION || name == header::PROXY_AUTHORIZATION {
                mask_authorization(&value)
            } else {
                value.into_owned()
            };
            (name.as_str().to_owned(), value)
        })
        .collect()
}

/// Build the upstream request for `request` authorized with `bearer`.
///
/// Fails only if the bearer token cannot be carried in a header.
pub fn build_outbound(
    request: Request<Bytes>,
    bearer: &BearerToken,
    config: &ForwardConfig,
) -> anyhow::Result<OutboundRequest> {
    let uri = request.uri();
    let target_path = strip_api_prefix(uri.path(), &config.api_prefix).to_owned();
    let target_url = match uri.query() {
        Some(query) => format!("{}{target_path}?{query}", config.upstream_base),
        None => format!("{}{target_path}", config.upstream_base),
    };

    let mut headers = request.headers().clone();
    for (name, value) in &config.headers {
        headers.insert(name.clone(), value.clone());
    }
    let authorization = HeaderValue::try_from(format!("Bearer {}", bearer.as_str()))
        .map_err(|_| anyhow::anyhow!("bearer token is not a valid header value"))?;
    headers.insert(header::AUTHORIZATION, authorization);
    let host = HeaderValue::try_from(config.upstream_host.as_str())
        .map_err(|_| anyhow::anyhow!("invalid upstream host {:?}", config.upstream_host))?;
    headers.insert(header::HOST, host);

    let body_json = if is_json(&headers) && !request.body().is_empty() {
        let body = request.body().clone();
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(err = %e, "failed to parse JSON body (ignored)");
                None
            }
        }
    } else {
        None
    };

    tracing::debug!(
        method = %request.method(),
        target_url = %target_url,
        headers = ?sanitize_headers(&headers),
        body = ?body_json,
        "prepared outbound request"
    );

    Ok(OutboundRequest { target_url, target_path, headers, body_json, request })
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
