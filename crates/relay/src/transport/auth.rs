// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;

use crate::error::RelayError;
use crate::secret::constant_time_eq;
use crate::state::RelayState;

/// Basic-auth user name for the admin API.
pub const ADMIN_USER: &str = "admin";

/// Realm advertised in `WWW-Authenticate`.
pub const ADMIN_REALM: &str = "Copilot Relay Admin";

/// Validate HTTP basic credentials `admin:<expected>`.
pub fn validate_basic(headers: &HeaderMap, expected: Option<&str>) -> Result<(), RelayError> {
    let expected = match expected {
        Some(pw) => pw,
        None => return Ok(()),
    };

    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::Unauthorized)?;
    let (scheme, encoded) = header.trim().split_once(' ').ok_or(RelayError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(RelayError::Unauthorized);
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| RelayError::Unauthorized)?;
    let decoded = String::from_utf8(decoded).map_err(|_| RelayError::Unauthorized)?;
    let (user, password) = decoded.split_once(':').ok_or(RelayError::Unauthorized)?;

    // Both comparisons always run.
    let user_ok = constant_time_eq(user, ADMIN_USER);
    let password_ok = constant_time_eq(password, expected);
    if user_ok & password_ok {
        Ok(())
    } else {
        Err(RelayError::Unauthorized)
    }
}

/// Paths authorized elsewhere: health, and the API prefix (via the
/// credential pipeline).
pub fn is_exempt(path: &str, api_prefix: &str) -> bool {
    if path == "/health" || path == api_prefix {
        return true;
    }
    path.strip_prefix(api_prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// Axum middleware that enforces basic auth on the admin surface.
pub async fn admin_gate(
    state: State<Arc<RelayState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if is_exempt(req.uri().path(), &state.forward.api_prefix) {
        return next.run(req).await;
    }

    if let Err(code) = validate_basic(req.headers(), state.config.admin_password.as_deref()) {
        tracing::debug!(path = %req.uri().path(), "admin authentication failed");
        let body = crate::error::ErrorResponse { error: code.to_error_body("unauthorized") };
        let challenge = HeaderValue::try_from(format!("Basic realm=\"{ADMIN_REALM}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        return (
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::UNAUTHORIZED),
            [(header::WWW_AUTHENTICATE, challenge)],
            axum::Json(body),
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
