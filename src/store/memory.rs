// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process log store and project registry.
//!
//! Backs the test suite and local runs. Every applied mutation is recorded so
//! tests can assert exactly which deltas reached the store - the overlay
//! dedup guarantees are about remote writes, not mirror state.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::store::{LogStore, MutateOp, ProjectRegistry};
use crate::types::{Fields, LogFilter, LogId, LogRecord};

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: u64,
    logs: HashMap<LogId, LogRecord>,
    order: Vec<LogId>,
    projects: HashSet<String>,
    mutations: Vec<(LogId, MutateOp)>,
}

/// In-memory [`LogStore`] + [`ProjectRegistry`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every mutation applied so far, in application order.
    pub fn mutations(&self) -> Vec<(LogId, MutateOp)> {
        self.lock().mutations.clone()
    }

    /// Number of mutations applied to `id`.
    pub fn mutation_count(&self, id: LogId) -> usize {
        self.lock().mutations.iter().filter(|(mid, _)| *mid == id).count()
    }

    /// Total number of logs across all projects.
    pub fn log_count(&self) -> usize {
        self.lock().logs.len()
    }
}

impl LogStore for MemoryStore {
    fn create_log(
        &self,
        project: &str,
        entries: &Fields,
        params: &Fields,
        skip_duplicates: bool,
    ) -> Result<LogId> {
        let mut inner = self.lock();
        if skip_duplicates {
            let existing = inner.order.iter().find(|id| {
                inner
                    .logs
                    .get(*id)
                    .is_some_and(|rec| rec.project == project && &rec.entries == entries)
            });
            if let Some(id) = existing {
                return Ok(*id);
            }
        }
        inner.next_id += 1;
        let id = LogId(inner.next_id);
        inner.logs.insert(
            id,
            LogRecord {
                id,
                project: project.to_string(),
                timestamp: Utc::now(),
                entries: entries.clone(),
                params: params.clone(),
            },
        );
        inner.order.push(id);
        Ok(id)
    }

    fn get_log(&self, id: LogId) -> Result<LogRecord> {
        self.lock().logs.get(&id).cloned().ok_or(Error::LogNotFound(id))
    }

    fn mutate_log(&self, id: LogId, op: MutateOp) -> Result<()> {
        let mut inner = self.lock();
        let record = inner.logs.get_mut(&id).ok_or(Error::LogNotFound(id))?;
        match &op {
            MutateOp::MergeEntries { fields } => {
                for (key, value) in fields {
                    record.entries.insert(key.clone(), value.clone());
                }
            }
            MutateOp::MergeParams { fields } => {
                for (key, value) in fields {
                    record.params.insert(key.clone(), value.clone());
                }
            }
            MutateOp::DeleteFields { keys } => {
                for key in keys {
                    if !record.entries.contains_key(key) && !record.params.contains_key(key) {
                        return Err(Error::MissingKey(key.clone()));
                    }
                }
                for key in keys {
                    record.entries.remove(key);
                    record.params.remove(key);
                }
            }
        }
        inner.mutations.push((id, op));
        Ok(())
    }

    fn delete_log(&self, id: LogId) -> Result<()> {
        let mut inner = self.lock();
        inner.logs.remove(&id).ok_or(Error::LogNotFound(id))?;
        inner.order.retain(|existing| *existing != id);
        Ok(())
    }

    fn list_logs(&self, project: &str, filter: Option<&LogFilter>) -> Result<Vec<LogRecord>> {
        let inner = self.lock();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.logs.get(id))
            .filter(|rec| rec.project == project)
            .filter(|rec| filter.is_none_or(|f| f.matches(rec)))
            .cloned()
            .collect())
    }
}

impl ProjectRegistry for MemoryStore {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().projects.contains(name))
    }

    fn create(&self, name: &str) -> Result<()> {
        self.lock().projects.insert(name.to_string());
        Ok(())
    }
}
