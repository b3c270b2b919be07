// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log store and project registry collaborators.
//!
//! The engine delegates all persistence to a [`LogStore`]; project existence
//! and creation go through a [`ProjectRegistry`]. Store calls are synchronous
//! from the caller's point of view. Log-store calls are never made under a
//! process-wide lock; the registry's exists/create pair is the one exception,
//! serialized by the client so concurrent first touches of a project race to
//! at most one create. Retry, backoff, and timeout policy all belong to the
//! store implementation, not to callers.
//!
//! Two implementations ship with the crate:
//!
//! - [`http::HttpStore`] - thin request-dispatch client for the remote
//!   service
//! - [`memory::MemoryStore`] - in-process store for tests and local runs

pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Fields, LogFilter, LogId, LogRecord};

/// A single mutation applied to an existing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutateOp {
    /// Shallow key merge into entries (last writer wins per key).
    MergeEntries { fields: Fields },
    /// Shallow key merge into params.
    MergeParams { fields: Fields },
    /// Remove the listed keys from entries and params. Fails with
    /// `Error::MissingKey` when any key is absent.
    DeleteFields { keys: Vec<String> },
}

/// Remote persistence of logs.
pub trait LogStore: Send + Sync {
    /// Create a log under `project`. With `skip_duplicates`, an existing log
    /// whose entries are value-equal is returned instead of a duplicate.
    fn create_log(
        &self,
        project: &str,
        entries: &Fields,
        params: &Fields,
        skip_duplicates: bool,
    ) -> Result<LogId>;

    /// Fetch the full record for `id`.
    fn get_log(&self, id: LogId) -> Result<LogRecord>;

    /// Apply one mutation to `id`.
    fn mutate_log(&self, id: LogId, op: MutateOp) -> Result<()>;

    /// Delete `id`. Terminal: later operations fail with
    /// `Error::LogNotFound`.
    fn delete_log(&self, id: LogId) -> Result<()>;

    /// List logs in `project` matching `filter` (all logs when `None`), in
    /// creation order.
    fn list_logs(&self, project: &str, filter: Option<&LogFilter>) -> Result<Vec<LogRecord>>;
}

/// Project existence and creation.
pub trait ProjectRegistry: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool>;
    fn create(&self, name: &str) -> Result<()>;
}
