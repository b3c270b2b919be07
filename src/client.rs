// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Entry point tying scopes, logs, and the store together.
//!
//! A [`Client`] binds one project to one store and registry. Logging calls
//! resolve the calling execution context's state at call time: explicit keys
//! are qualified with the namespace path, open Entries/Params overlays are
//! merged in, and the implicit form targets the current log when a log scope
//! is open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::{resolve_api_key, ClientConfig};
use crate::context::scopes::LogScope;
use crate::context::state;
use crate::error::Result;
use crate::log::Log;
use crate::store::{HttpStore, LogStore, ProjectRegistry};
use crate::types::{Fields, LogFilter, LogId};

// Serializes the exists/create pair across clients so concurrent first
// touches of the same project race to at most one create call.
static PROJECT_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

pub struct Client {
    store: Arc<dyn LogStore>,
    registry: Arc<dyn ProjectRegistry>,
    project: String,
    project_ready: AtomicBool,
}

impl Client {
    /// Build a client against the HTTP store. Fails immediately when no
    /// usable credential is configured or in the environment.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let http = Arc::new(HttpStore::new(&config.base_url, api_key)?);
        Ok(Self {
            store: http.clone(),
            registry: http,
            project: config.project,
            project_ready: AtomicBool::new(false),
        })
    }

    /// Build a client over explicit collaborators.
    pub fn with_store(
        store: Arc<dyn LogStore>,
        registry: Arc<dyn ProjectRegistry>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            project: project.into(),
            project_ready: AtomicBool::new(false),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Create the bound project if it does not exist yet. Checked at most
    /// once per client; the exists/create pair runs under a process-wide
    /// lock.
    fn ensure_project(&self) -> Result<()> {
        if self.project_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = PROJECT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        if !self.project_ready.load(Ordering::Acquire) {
            if !self.registry.exists(&self.project)? {
                debug!(project = %self.project, "creating project");
                self.registry.create(&self.project)?;
            }
            self.project_ready.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Create a new log from explicit `entries` and `params` plus the calling
    /// context's state: explicit keys are qualified with the namespace path
    /// and open overlays are merged underneath (explicit values win).
    ///
    /// With `skip_duplicates`, the store may answer with an existing log
    /// whose entries already equal the submitted ones; the returned handle
    /// mirrors whichever record the store settled on.
    pub fn create_log(
        &self,
        entries: Fields,
        params: Fields,
        skip_duplicates: bool,
    ) -> Result<Log> {
        self.ensure_project()?;

        let (merged_entries, merged_params) = state::with(|s| {
            let mut merged_entries = s.entries.effective().clone();
            for (key, value) in entries {
                merged_entries.insert(s.path.qualify(&key), value);
            }
            let mut merged_params = s.params.effective().clone();
            for (key, value) in params {
                merged_params.insert(s.path.qualify(&key), value);
            }
            (merged_entries, merged_params)
        });

        let id = self
            .store
            .create_log(&self.project, &merged_entries, &merged_params, skip_duplicates)?;
        let record = self.store.get_log(id)?;

        // Everything the overlays contributed is on the record now; don't
        // re-send it on the next touch of this log in the same scopes.
        state::with(|s| {
            let entry_keys: Vec<String> = s.entries.effective().keys().cloned().collect();
            s.entries.mark_synced(id, entry_keys);
            let param_keys: Vec<String> = s.params.effective().keys().cloned().collect();
            s.params.mark_synced(id, param_keys);
        });

        Ok(Log::new(self.store.clone(), record))
    }

    /// Implicit logging form: add `entries` to the current log when a log
    /// scope is open, otherwise create a fresh log from them.
    pub fn log(&self, entries: Fields) -> Result<Log> {
        match crate::context::current_log() {
            Some(log) => {
                log.add_entries(entries)?;
                Ok(log)
            }
            None => self.create_log(entries, Fields::new(), true),
        }
    }

    /// Add entries to `target`, falling back to the current log, falling
    /// back to creating a fresh log.
    pub fn add_log_entries(&self, target: Option<&Log>, entries: Fields) -> Result<Log> {
        match target.cloned().or_else(crate::context::current_log) {
            Some(log) => {
                log.add_entries(entries)?;
                Ok(log)
            }
            None => self.create_log(entries, Fields::new(), true),
        }
    }

    /// Param counterpart of [`Client::add_log_entries`].
    pub fn add_log_params(&self, target: Option<&Log>, params: Fields) -> Result<Log> {
        match target.cloned().or_else(crate::context::current_log) {
            Some(log) => {
                log.add_params(params)?;
                Ok(log)
            }
            None => self.create_log(Fields::new(), params, true),
        }
    }

    /// Open a log scope: create a log from `entries` and make it the current
    /// log until the returned guard drops. Scoped logs are always created
    /// fresh; duplicate detection would silently join two scopes that happen
    /// to start from equal entries.
    pub fn log_scope(&self, entries: Fields) -> Result<LogScope> {
        let log = self.create_log(entries, Fields::new(), false)?;
        Ok(LogScope::new(log))
    }

    /// Fetch one log by id.
    pub fn get_log_by_id(&self, id: LogId) -> Result<Log> {
        let record = self.store.get_log(id)?;
        Ok(Log::new(self.store.clone(), record))
    }

    /// Fetch the first log whose entries exactly equal `entries`, if any.
    pub fn get_log_by_value(&self, entries: Fields) -> Result<Option<Log>> {
        let filter = LogFilter::entries_equal(entries);
        Ok(self.get_logs(Some(&filter))?.into_iter().next())
    }

    /// List the project's logs, newest-created last. `None` lists all.
    pub fn get_logs(&self, filter: Option<&LogFilter>) -> Result<Vec<Log>> {
        self.ensure_project()?;
        let records = self.store.list_logs(&self.project, filter)?;
        Ok(records
            .into_iter()
            .map(|record| Log::new(self.store.clone(), record))
            .collect())
    }

    /// Delete every log matching `filter` (all logs when `None`); returns
    /// the number deleted.
    pub fn delete_logs(&self, filter: Option<&LogFilter>) -> Result<usize> {
        self.ensure_project()?;
        let records = self.store.list_logs(&self.project, filter)?;
        let count = records.len();
        for record in &records {
            self.store.delete_log(record.id)?;
        }
        Ok(count)
    }
}
