// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::forward::ForwardConfig;

/// Headers sent to the Copilot endpoints when none are configured.
pub const DEFAULT_UPSTREAM_HEADERS: &[(&str, &str)] = &[
    ("editor-version", "vscode/1.99.3"),
    ("editor-plugin-version", "copilot-chat/0.26.7"),
    ("copilot-integration-id", "vscode-chat"),
    ("user-agent", "GitHubCopilotChat/0.26.7"),
    ("openai-intent", "conversation-panel"),
    ("x-github-api-version", "2025-04-01"),
];

/// Configuration for the Copilot relay.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "copilot-relay", version, about = "Relay API calls to GitHub Copilot")]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "COPILOT_RELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "COPILOT_RELAY_PORT")]
    pub port: u16,

    /// Base URL of the upstream completions API.
    #[arg(long, default_value = "https://api.githubcopilot.com", env = "COPILOT_API_URL")]
    pub upstream_url: String,

    /// Token exchange endpoint (OAuth credential → bearer token).
    #[arg(
        long,
        default_value = "https://api.github.com/copilot_internal/v2/token",
        env = "COPILOT_TOKEN_URL"
    )]
    pub token_url: String,

    /// Inbound path prefix for forwarded API calls.
    #[arg(long, default_value = "/api", env = "COPILOT_RELAY_API_PREFIX")]
    pub api_prefix: String,

    /// Extra upstream header as `name: value` (repeatable). Replaces the
    /// built-in Copilot header set when given.
    #[arg(long = "upstream-header", env = "COPILOT_UPSTREAM_HEADERS", value_delimiter = ';')]
    pub upstream_headers: Vec<String>,

    /// Password for the admin API (basic auth user `admin`). Unset disables the gate.
    #[arg(long, env = "ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    /// Directory holding `store.json`.
    #[arg(long, env = "STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Keep secrets in memory only.
    #[arg(long, env = "COPILOT_RELAY_EPHEMERAL")]
    pub ephemeral: bool,

    /// With no API keys configured, accept raw OAuth tokens as credentials.
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "COPILOT_RELAY_LEGACY_PASSTHROUGH"
    )]
    pub legacy_passthrough: bool,

    /// Token exchange timeout in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "COPILOT_RELAY_EXCHANGE_TIMEOUT_MS")]
    pub exchange_timeout_ms: u64,

    /// Forwarded request timeout in milliseconds (covers streamed responses).
    #[arg(long, default_value_t = 600_000, env = "COPILOT_RELAY_UPSTREAM_TIMEOUT_MS")]
    pub upstream_timeout_ms: u64,

    /// Maximum buffered request body size in bytes.
    #[arg(long, default_value_t = 32 * 1024 * 1024, env = "COPILOT_RELAY_MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    /// Log format (json or text).
    #[arg(long, env = "COPILOT_RELAY_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COPILOT_RELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Parse a `name: value` header argument.
pub fn parse_header_arg(arg: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let (name, value) = arg.split_once(':').ok_or_else(|| {
        anyhow::anyhow!("invalid upstream header {arg:?}: expected `name: value`")
    })?;
    let name = HeaderName::from_bytes(name.trim().to_ascii_lowercase().as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid upstream header name in {arg:?}: {e}"))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| anyhow::anyhow!("invalid upstream header value in {arg:?}: {e}"))?;
    Ok((name, value))
}

fn parse_http_url(raw: &str, flag: &str) -> anyhow::Result<reqwest::Url> {
    let url =
        reqwest::Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid {flag} {raw:?}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("invalid {flag} {raw:?}: scheme must be http or https");
    }
    if url.host_str().is_none() {
        anyhow::bail!("invalid {flag} {raw:?}: missing host");
    }
    Ok(url)
}

impl RelayConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        parse_http_url(&self.upstream_url, "--upstream-url")?;
        parse_http_url(&self.token_url, "--token-url")?;

        let prefix = &self.api_prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            anyhow::bail!("invalid --api-prefix {prefix:?}: expected a path like /api");
        }

        self.upstream_header_map()?;

        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid --log-format {:?}: expected json or text", self.log_format);
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("--max-body-bytes must be positive");
        }
        if self.exchange_timeout_ms == 0 || self.upstream_timeout_ms == 0 {
            anyhow::bail!("timeouts must be positive");
        }
        Ok(())
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Headers sent upstream on both the token exchange and forwarded calls.
    pub fn upstream_header_map(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if self.upstream_headers.is_empty() {
            for &(name, value) in DEFAULT_UPSTREAM_HEADERS {
                headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
            }
            return Ok(headers);
        }
        for arg in &self.upstream_headers {
            let (name, value) = parse_header_arg(arg)?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    pub fn forward_config(&self) -> anyhow::Result<ForwardConfig> {
        let url = parse_http_url(&self.upstream_url, "--upstream-url")?;
        let host = url.host_str().unwrap_or_default();
        let upstream_host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        Ok(ForwardConfig {
            api_prefix: self.api_prefix.clone(),
            upstream_base: self.upstream_url.trim_end_matches('/').to_owned(),
            upstream_host,
            headers: self.upstream_header_map()?,
        })
    }

    /// Path of the persisted store file, or `None` when ephemeral.
    pub fn store_path(&self) -> Option<PathBuf> {
        if self.ephemeral {
            return None;
        }
        let dir = self.storage_dir.clone().unwrap_or_else(crate::store::state_dir);
        Some(dir.join("store.json"))
    }

    /// Build a minimal `RelayConfig` for tests (port 0, in-memory store).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            upstream_url: "http://127.0.0.1:9".into(),
            token_url: "http://127.0.0.1:9/copilot_internal/v2/token".into(),
            api_prefix: "/api".into(),
            upstream_headers: vec![],
            admin_password: None,
            storage_dir: None,
            ephemeral: true,
            legacy_passthrough: true,
            exchange_timeout_ms: 5_000,
            upstream_timeout_ms: 5_000,
            max_body_bytes: 1024 * 1024,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
