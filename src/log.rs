// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The unit of record: a log handle with identity, timestamp, entries, and
//! params.
//!
//! Handles are cheap to clone and share one local mirror; two handles are
//! equal iff their identifiers are equal. Every mutation goes to the store
//! first and touches the mirror only after the remote call succeeds, so the
//! mirror never runs ahead of the service. Keys named in explicit mutations
//! are qualified through the current namespace path, and scope-derived
//! defaults from open Entries/Params overlays ride along with the first
//! touch of each log (deduplicated per log while the scope stays open).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::context::state;
use crate::error::{Error, Result};
use crate::store::{LogStore, MutateOp};
use crate::types::{Fields, LogId, LogRecord, UpdateFn};

/// Which field mapping an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Entries,
    Params,
}

impl FieldKind {
    fn merge_op(self, fields: Fields) -> MutateOp {
        match self {
            Self::Entries => MutateOp::MergeEntries { fields },
            Self::Params => MutateOp::MergeParams { fields },
        }
    }
}

#[derive(Debug)]
struct LogData {
    project: String,
    timestamp: DateTime<Utc>,
    entries: Fields,
    params: Fields,
}

/// Shared handle to one log.
#[derive(Clone)]
pub struct Log {
    id: LogId,
    store: Arc<dyn LogStore>,
    data: Arc<Mutex<LogData>>,
}

impl Log {
    /// Wrap a store record in a live handle.
    pub(crate) fn new(store: Arc<dyn LogStore>, record: LogRecord) -> Self {
        Self {
            id: record.id,
            store,
            data: Arc::new(Mutex::new(LogData {
                project: record.project,
                timestamp: record.timestamp,
                entries: record.entries,
                params: record.params,
            })),
        }
    }

    fn data(&self) -> MutexGuard<'_, LogData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> LogId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.data().timestamp
    }

    pub fn project(&self) -> String {
        self.data().project.clone()
    }

    /// Snapshot of the mirrored entries.
    pub fn entries(&self) -> Fields {
        self.data().entries.clone()
    }

    /// Snapshot of the mirrored params.
    pub fn params(&self) -> Fields {
        self.data().params.clone()
    }

    /// Add entries: explicit values (path-qualified) plus any scope defaults
    /// not yet pushed to this log.
    pub fn add_entries(&self, entries: Fields) -> Result<()> {
        self.apply(FieldKind::Entries, entries)
    }

    /// Add params, same apply rules as [`Log::add_entries`].
    pub fn add_params(&self, params: Fields) -> Result<()> {
        self.apply(FieldKind::Params, params)
    }

    /// Replace entries. Merge semantics are identical to [`Log::add_entries`];
    /// the name documents the intent to overwrite existing keys.
    pub fn replace_entries(&self, entries: Fields) -> Result<()> {
        self.apply(FieldKind::Entries, entries)
    }

    /// Replace params; see [`Log::replace_entries`].
    pub fn replace_params(&self, params: Fields) -> Result<()> {
        self.apply(FieldKind::Params, params)
    }

    /// Combine each delta value with the existing value: `new = f(old, new)`.
    ///
    /// Fails with [`Error::MissingUpdateFn`] when a per-key map lacks a
    /// function for some delta key, and with [`Error::MissingKey`] when a
    /// delta key has no existing value to combine with. Nothing is written on
    /// failure.
    pub fn update_entries(&self, f: &UpdateFn<'_>, delta: Fields) -> Result<()> {
        self.update(FieldKind::Entries, f, delta)
    }

    /// See [`Log::update_entries`].
    pub fn update_params(&self, f: &UpdateFn<'_>, delta: Fields) -> Result<()> {
        self.update(FieldKind::Params, f, delta)
    }

    /// For each `(old, new)` pair, copy the value under `new` and remove
    /// `old`. Validates every `old` key up front so a failure never leaves a
    /// partial rename.
    pub fn rename_entries(
        &self,
        mapping: impl IntoIterator<Item = (String, String)>,
    ) -> Result<()> {
        let mapping: Vec<(String, String)> = state::with(|s| {
            mapping
                .into_iter()
                .map(|(old, new)| (s.path.qualify(&old), s.path.qualify(&new)))
                .collect()
        });

        let mut moved = Fields::new();
        let mut removed = Vec::new();
        {
            let data = self.data();
            for (old, new) in &mapping {
                let value = data
                    .entries
                    .get(old)
                    .ok_or_else(|| Error::MissingKey(old.clone()))?;
                moved.insert(new.clone(), value.clone());
                removed.push(old.clone());
            }
        }

        self.store
            .mutate_log(self.id, MutateOp::MergeEntries { fields: moved.clone() })?;
        if let Err(err) = self
            .store
            .mutate_log(self.id, MutateOp::DeleteFields { keys: removed.clone() })
        {
            // Undo the merge so the remote never holds a half-applied rename.
            let added: Vec<String> = moved.keys().cloned().collect();
            if let Err(undo_err) = self
                .store
                .mutate_log(self.id, MutateOp::DeleteFields { keys: added })
            {
                warn!(log = %self.id, error = %undo_err, "rename rollback failed");
            }
            return Err(err);
        }

        let mut data = self.data();
        for (key, value) in moved {
            data.entries.insert(key, value);
        }
        for key in removed {
            data.entries.remove(&key);
        }
        Ok(())
    }

    /// Remove the listed keys remotely and locally. Fails with
    /// [`Error::MissingKey`] before any removal when a key is absent.
    pub fn delete_fields(&self, keys: impl IntoIterator<Item = String>) -> Result<()> {
        let keys: Vec<String> =
            state::with(|s| keys.into_iter().map(|key| s.path.qualify(&key)).collect());
        {
            let data = self.data();
            for key in &keys {
                if !data.entries.contains_key(key) && !data.params.contains_key(key) {
                    return Err(Error::MissingKey(key.clone()));
                }
            }
        }
        self.store
            .mutate_log(self.id, MutateOp::DeleteFields { keys: keys.clone() })?;
        let mut data = self.data();
        for key in keys {
            data.entries.remove(&key);
            data.params.remove(&key);
        }
        Ok(())
    }

    /// Delete the log. Terminal: any further operation on this identifier
    /// fails with [`Error::LogNotFound`].
    pub fn delete(self) -> Result<()> {
        self.store.delete_log(self.id)
    }

    /// Re-download entries and params from the store into the mirror.
    pub fn refresh(&self) -> Result<()> {
        let record = self.store.get_log(self.id)?;
        let mut data = self.data();
        data.entries = record.entries;
        data.params = record.params;
        data.timestamp = record.timestamp;
        Ok(())
    }

    fn apply(&self, kind: FieldKind, explicit: Fields) -> Result<()> {
        let delta = state::with(|s| {
            let mut delta = match kind {
                FieldKind::Entries => s.entries.unsynced(self.id),
                FieldKind::Params => s.params.unsynced(self.id),
            };
            for (key, value) in explicit {
                delta.insert(s.path.qualify(&key), value);
            }
            delta
        });
        if delta.is_empty() {
            return Ok(());
        }

        self.store.mutate_log(self.id, kind.merge_op(delta.clone()))?;

        {
            let mut data = self.data();
            let target = match kind {
                FieldKind::Entries => &mut data.entries,
                FieldKind::Params => &mut data.params,
            };
            for (key, value) in &delta {
                target.insert(key.clone(), value.clone());
            }
        }
        state::with(|s| {
            let overlay = match kind {
                FieldKind::Entries => &mut s.entries,
                FieldKind::Params => &mut s.params,
            };
            overlay.mark_synced(self.id, delta.keys().cloned());
        });
        Ok(())
    }

    fn update(&self, kind: FieldKind, f: &UpdateFn<'_>, delta: Fields) -> Result<()> {
        let delta: Fields = state::with(|s| {
            delta
                .into_iter()
                .map(|(key, value)| (s.path.qualify(&key), value))
                .collect()
        });

        let mut replacements = Fields::new();
        {
            let data = self.data();
            let existing = match kind {
                FieldKind::Entries => &data.entries,
                FieldKind::Params => &data.params,
            };
            for (key, new_value) in &delta {
                let combine = f.resolve(key)?;
                let old_value = existing
                    .get(key)
                    .ok_or_else(|| Error::MissingKey(key.clone()))?;
                replacements.insert(key.clone(), combine(old_value, new_value));
            }
        }

        self.store
            .mutate_log(self.id, kind.merge_op(replacements.clone()))?;
        let mut data = self.data();
        let target = match kind {
            FieldKind::Entries => &mut data.entries,
            FieldKind::Params => &mut data.params,
        };
        for (key, value) in replacements {
            target.insert(key, value);
        }
        Ok(())
    }
}

impl PartialEq for Log {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Log {}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Log(id={})", self.id)
    }
}
