// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! File-backed response cache keyed by canonical request JSON.
//!
//! Keys are derived from the request value with all `null` object members
//! pruned recursively, so a request spelled with explicit nulls and one that
//! omits those members cache-hit each other. Object members serialize in
//! sorted key order, which makes the derived key stable across processes.
//! Every `put` rewrites the backing file; `get` is served from memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::{Error, Result};

pub struct ResponseCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

/// Drop `null` object members at every depth. Array elements are kept even
/// when null; only object members are pruned.
fn prune_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(prune_nulls).collect()),
        other => other.clone(),
    }
}

impl ResponseCache {
    /// Open the cache at `path`, loading any existing contents. A missing
    /// file starts an empty cache; a present but unreadable file is an
    /// error rather than a silent reset.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|err| Error::Cache(format!("read {}: {err}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|err| Error::Cache(format!("parse {}: {err}", path.display())))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The canonical cache key for `request`.
    pub fn key(request: &Value) -> String {
        prune_nulls(request).to_string()
    }

    pub fn get(&self, request: &Value) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&Self::key(request)).cloned()
    }

    /// Store `response` under `request`'s key and rewrite the backing file.
    pub fn put(&self, request: &Value, response: Value) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(Self::key(request), response);
        let serialized = serde_json::to_string(&*entries)
            .map_err(|err| Error::Cache(format!("serialize cache: {err}")))?;
        fs::write(&self.path, serialized)
            .map_err(|err| Error::Cache(format!("write {}: {err}", self.path.display())))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_members_do_not_change_key() {
        let spelled_out = json!({ "model": "m", "seed": null, "tags": [null, 1] });
        let omitted = json!({ "model": "m", "tags": [null, 1] });
        assert_eq!(ResponseCache::key(&spelled_out), ResponseCache::key(&omitted));
    }

    #[test]
    fn test_key_is_order_insensitive() {
        let a = json!({ "b": 2, "a": 1 });
        let b = json!({ "a": 1, "b": 2 });
        assert_eq!(ResponseCache::key(&a), ResponseCache::key(&b));
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path().join("cache.json")).unwrap();

        let request = json!({ "model": "m", "prompt": "hi" });
        assert!(cache.get(&request).is_none());
        cache.put(&request, json!("hello")).unwrap();
        assert_eq!(cache.get(&request), Some(json!("hello")));
    }

    #[test]
    fn test_reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = ResponseCache::open(&path).unwrap();
        cache.put(&json!({ "q": 1 }), json!("answer")).unwrap();
        drop(cache);

        let reopened = ResponseCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get(&json!({ "q": 1 })), Some(json!("answer")));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(ResponseCache::open(&path), Err(Error::Cache(_))));
    }
}
