// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store persistence: load/save to JSON file with atomic writes.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::store::{ApiKeyRecord, OAuthTokenRecord};

/// On-disk form of the secret store. Records are kept in creation order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedStore {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyRecord>,
    #[serde(default)]
    pub oauth_tokens: Vec<OAuthTokenRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_token_id: Option<String>,
}

/// Load the persisted store. A missing file yields an empty store.
pub fn load(path: &Path) -> anyhow::Result<PersistedStore> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PersistedStore::default())
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let store: PersistedStore = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(store)
}

/// Save the store atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// share a `.tmp` file.
pub fn save(path: &Path, store: &PersistedStore) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(store)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
