//! Local filesystem archive adapter. Keys use `/` regardless of host
//! platform; this adapter is the one place that maps to `std::path::MAIN_SEPARATOR`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{ArchiveAdapter, DeleteOutcome, ObjectSummary};
use crate::error::Result;

pub struct LocalAdapter {
    root: PathBuf,
}

impl LocalAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl ArchiveAdapter for LocalAdapter {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<String> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn list(&self, prefix: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ObjectSummary>> {
        let base = self.resolve(prefix);
        let mut results = Vec::new();
        collect_entries(&self.root, &base, since, &mut results).await?;
        Ok(results)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key);
        Ok(fs::read(&path).await?)
    }

    async fn delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let path = self.resolve(key);
            let outcome = match fs::remove_file(&path).await {
                Ok(_) => DeleteOutcome {
                    key: key.clone(),
                    deleted: true,
                    error: None,
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeleteOutcome {
                    key: key.clone(),
                    deleted: false,
                    error: Some("not found".to_string()),
                },
                Err(e) => DeleteOutcome {
                    key: key.clone(),
                    deleted: false,
                    error: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Recursively walk `dir` under `root`, emitting entries whose relative key
/// starts with the already-resolved `base` path and postdates `since`.
async fn collect_entries(
    root: &Path,
    base: &Path,
    since: Option<DateTime<Utc>>,
    out: &mut Vec<ObjectSummary>,
) -> Result<()> {
    let walk_root = if base.is_dir() { base } else { base.parent().unwrap_or(root) };
    if !walk_root.exists() {
        return Ok(());
    }

    let mut stack = vec![walk_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                stack.push(path);
                continue;
            }
            if !path.starts_with(base) && base != walk_root {
                continue;
            }
            let modified: DateTime<Utc> = metadata.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
            if let Some(since) = since {
                if modified < since {
                    continue;
                }
            }
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let key = relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
            out.push(ObjectSummary {
                key,
                size: metadata.len(),
                last_modified: modified,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalAdapter::new(dir.path());
        adapter
            .put("2025/08/25/f.json", b"[]".to_vec(), "application/json", HashMap::new())
            .await
            .unwrap();
        let bytes = adapter.get("2025/08/25/f.json").await.unwrap();
        assert_eq!(bytes, b"[]");
    }

    #[tokio::test]
    async fn delete_missing_key_reports_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalAdapter::new(dir.path());
        let outcomes = adapter.delete(&["missing.json".to_string()]).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].deleted);
    }

    #[tokio::test]
    async fn list_finds_uploaded_keys_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalAdapter::new(dir.path());
        adapter
            .put("2025/08/25/a.json", b"1".to_vec(), "application/json", HashMap::new())
            .await
            .unwrap();
        adapter
            .put("2025/08/26/b.json", b"2".to_vec(), "application/json", HashMap::new())
            .await
            .unwrap();
        let listed = adapter.list("2025/08/25", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].key.ends_with("a.json"));
    }
}
