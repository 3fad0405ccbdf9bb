// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn tokens_list_in_creation_order() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let a = store.create_oauth_token("a".into(), "gho_a".into()).await?;
    let b = store.create_oauth_token("b".into(), "gho_b".into()).await?;
    let c = store.create_oauth_token("c".into(), "gho_c".into()).await?;

    let ids: Vec<String> = store.list_oauth_tokens().await?.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a.id.clone(), b.id.clone(), c.id.clone()]);

    // Removal keeps the relative order of the rest.
    assert!(store.remove_oauth_token(&b.id).await?);
    let ids: Vec<String> = store.list_oauth_tokens().await?.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a.id, c.id]);
    Ok(())
}

#[tokio::test]
async fn api_key_lookup_by_secret() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let key = store.create_api_key("ci".into(), Some("t-1".into())).await?;
    assert!(key.secret.starts_with("sk-"));

    let found = store.find_api_key_by_secret(&key.secret).await?;
    assert_eq!(found, Some(key.clone()));
    assert_eq!(store.find_api_key_by_secret("sk-nope").await?, None);

    assert!(store.remove_api_key(&key.id).await?);
    assert!(!store.remove_api_key(&key.id).await?);
    assert_eq!(store.find_api_key_by_secret(&key.secret).await?, None);
    Ok(())
}

#[tokio::test]
async fn selection_follows_token_lifecycle() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let t = store.create_oauth_token("default".into(), "gho_default".into()).await?;
    assert_eq!(store.find_selected_oauth_token().await?, None);

    assert!(!store.select_oauth_token(Some("missing")).await?);
    assert!(store.select_oauth_token(Some(t.id.as_str())).await?);
    assert_eq!(store.find_selected_oauth_token().await?.map(|s| s.id), Some(t.id.clone()));

    // Deleting the selected token clears the selection.
    assert!(store.remove_oauth_token(&t.id).await?);
    assert_eq!(store.find_selected_oauth_token().await?, None);
    Ok(())
}

#[tokio::test]
async fn persistent_store_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("store.json");

    let (key, token) = {
        let store = MemoryStore::open(&path)?;
        let token = store.create_oauth_token("main".into(), "gho_main".into()).await?;
        let key = store.create_api_key("app".into(), Some(token.id.clone())).await?;
        store.select_oauth_token(Some(token.id.as_str())).await?;
        (key, token)
    };

    let reopened = MemoryStore::open(&path)?;
    assert_eq!(reopened.path(), Some(path.as_path()));
    assert_eq!(reopened.list_api_keys().await?, vec![key]);
    assert_eq!(reopened.list_oauth_tokens().await?, vec![token.clone()]);
    assert_eq!(reopened.find_selected_oauth_token().await?, Some(token));
    Ok(())
}

#[tokio::test]
async fn open_missing_file_is_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = MemoryStore::open(dir.path().join("store.json"))?;
    assert!(store.list_api_keys().await?.is_empty());
    assert!(store.list_oauth_tokens().await?.is_empty());
    Ok(())
}

#[test]
fn open_rejects_corrupt_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{not json")?;
    assert!(MemoryStore::open(&path).is_err());
    Ok(())
}

#[test]
fn dangling_selection_is_dropped_on_load() -> anyhow::Result<()> {
    let persisted = PersistedStore {
        api_keys: vec![],
        oauth_tokens: vec![],
        selected_token_id: Some("gone".into()),
    };
    let data = StoreData::from_persisted(persisted);
    assert_eq!(data.selected_token_id, None);
    Ok(())
}

#[tokio::test]
async fn failed_save_leaves_records_unchanged() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store.json");
    let store = MemoryStore::open(&path)?;
    let a = store.create_oauth_token("a".into(), "gho_a".into()).await?;
    let b = store.create_oauth_token("b".into(), "gho_b".into()).await?;
    let key = store.create_api_key("app".into(), None).await?;
    store.select_oauth_token(Some(a.id.as_str())).await?;

    // A directory in place of the file makes every save fail at rename.
    std::fs::remove_file(&path)?;
    std::fs::create_dir(&path)?;

    assert!(store.remove_oauth_token(&a.id).await.is_err());
    assert!(store.remove_api_key(&key.id).await.is_err());
    assert!(store.select_oauth_token(Some(b.id.as_str())).await.is_err());
    assert!(store.select_oauth_token(None).await.is_err());

    let ids: Vec<String> = store.list_oauth_tokens().await?.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a.id.clone(), b.id]);
    assert_eq!(store.list_api_keys().await?, vec![key]);
    assert_eq!(store.find_selected_oauth_token().await?.map(|t| t.id), Some(a.id));
    Ok(())
}
