// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderValue;

use super::*;
use crate::store::memory::MemoryStore;

fn headers_with(auth: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = auth {
        if let Ok(v) = HeaderValue::from_str(value) {
            headers.insert(header::AUTHORIZATION, v);
        }
    }
    headers
}

#[yare::parameterized(
    missing = { None, "" },
    bearer = { Some("Bearer sk-abc"), "sk-abc" },
    bearer_lowercase = { Some("bearer sk-abc"), "sk-abc" },
    token_scheme = { Some("token gho_123"), "gho_123" },
    token_uppercase = { Some("TOKEN gho_123"), "gho_123" },
    extra_whitespace = { Some("Bearer    sk-abc  "), "sk-abc" },
    bare_value = { Some("sk-abc"), "sk-abc" },
    placeholder = { Some("Bearer _"), "_" },
    other_scheme = { Some("Basic YWRtaW46cHc="), "Basic YWRtaW46cHc=" },
)]
fn extracts_credential(auth: Option<&str>, expected: &str) {
    assert_eq!(extract_credential(&headers_with(auth)), expected);
}

fn resolver(store: &Arc<MemoryStore>, legacy: bool) -> ApiKeyResolver {
    ApiKeyResolver::new(Arc::clone(store) as Arc<dyn SecretStore>, legacy)
}

#[tokio::test]
async fn zero_keys_empty_credential_uses_default() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let r = resolver(&store, true);
    assert_eq!(r.resolve("").await?, CredentialPolicy::DefaultToken);
    Ok(())
}

#[tokio::test]
async fn zero_keys_placeholder_is_invalid() {
    let store = Arc::new(MemoryStore::new());
    let r = resolver(&store, true);
    assert_eq!(r.resolve("_").await, Err(AuthError::CredentialInvalid));
}

#[tokio::test]
async fn zero_keys_credential_passes_through() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let r = resolver(&store, true);
    assert_eq!(
        r.resolve("gho_raw").await?,
        CredentialPolicy::Passthrough { oauth_credential: "gho_raw".into() }
    );
    Ok(())
}

#[tokio::test]
async fn zero_keys_without_legacy_requires_key() {
    let store = Arc::new(MemoryStore::new());
    let r = resolver(&store, false);
    assert_eq!(r.resolve("").await, Err(AuthError::CredentialMissing { keys_configured: false }));
    assert_eq!(r.resolve("_").await, Err(AuthError::CredentialInvalid));
    assert_eq!(r.resolve("gho_raw").await, Err(AuthError::CredentialInvalid));
}

#[tokio::test]
async fn keys_present_rejects_missing_placeholder_and_unknown() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.create_api_key("app".into(), None).await?;
    let r = resolver(&store, true);

    assert_eq!(r.resolve("").await, Err(AuthError::CredentialMissing { keys_configured: true }));
    assert_eq!(r.resolve("_").await, Err(AuthError::CredentialInvalid));
    assert_eq!(r.resolve("sk-unknown").await, Err(AuthError::CredentialInvalid));
    // A raw OAuth token is no longer accepted once keys exist.
    assert_eq!(r.resolve("gho_raw").await, Err(AuthError::CredentialInvalid));
    Ok(())
}

#[tokio::test]
async fn matching_keys_resolve_to_policy() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let global = store.create_api_key("global".into(), None).await?;
    let linked = store.create_api_key("linked".into(), Some("t-1".into())).await?;
    let r = resolver(&store, true);

    assert_eq!(
        r.resolve(&global.secret).await?,
        CredentialPolicy::Global { key_name: "global".into() }
    );
    let policy = r.resolve(&linked.secret).await?;
    assert_eq!(
        policy,
        CredentialPolicy::Linked { key_name: "linked".into(), token_id: "t-1".into() }
    );
    assert_eq!(policy.label(), "linked");

    // Repeated resolution does not change the outcome.
    assert_eq!(r.resolve(&linked.secret).await?, policy);
    Ok(())
}
