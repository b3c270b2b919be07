// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! RAII scope guards over the context-local state.
//!
//! Each guard mutates the calling execution context's state on construction
//! and restores the prior state when dropped. Guards from the same family
//! must be dropped in reverse entry order; holding them as ordinary locals
//! gives that for free.

use std::thread;

use tracing::warn;

use crate::context::active_log::ActiveLogToken;
use crate::context::overlay::OverlayToken;
use crate::context::path::PathToken;
use crate::context::state;
use crate::log::Log;
use crate::types::Fields;

/// Appends a segment to the namespace path for the guard's lifetime. Keys
/// contributed to logs or overlays while the guard lives are prefixed with
/// the joined path.
#[derive(Debug)]
pub struct ContextScope {
    token: Option<PathToken>,
}

impl ContextScope {
    pub fn enter(segment: &str) -> Self {
        let token = state::with(|s| s.path.push(segment));
        Self { token: Some(token) }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            state::with(|s| s.path.pop(token));
        }
    }
}

/// The calling context's current namespace path, empty outside any
/// [`ContextScope`].
pub fn current_path() -> String {
    state::with(|s| s.path.as_str().to_string())
}

/// Overlays default entries onto every log touched while the guard lives.
///
/// Keys are qualified with the namespace path as of entry; the path active
/// when a log is later written does not re-qualify them.
#[derive(Debug)]
pub struct EntriesScope {
    token: Option<OverlayToken>,
}

impl EntriesScope {
    pub fn enter(values: Fields) -> Self {
        let token = state::with(|s| {
            let qualified: Fields = values
                .into_iter()
                .map(|(key, value)| (s.path.qualify(&key), value))
                .collect();
            s.entries.enter(qualified)
        });
        Self { token: Some(token) }
    }
}

impl Drop for EntriesScope {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            state::with(|s| s.entries.exit(token));
        }
    }
}

/// Overlays default params onto every log touched while the guard lives.
/// Same qualification and nesting rules as [`EntriesScope`].
#[derive(Debug)]
pub struct ParamsScope {
    token: Option<OverlayToken>,
}

impl ParamsScope {
    pub fn enter(values: Fields) -> Self {
        let token = state::with(|s| {
            let qualified: Fields = values
                .into_iter()
                .map(|(key, value)| (s.path.qualify(&key), value))
                .collect();
            s.params.enter(qualified)
        });
        Self { token: Some(token) }
    }
}

impl Drop for ParamsScope {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            state::with(|s| s.params.exit(token));
        }
    }
}

/// Makes one log the current log for implicit logging calls.
///
/// Created by [`crate::Client::log_scope`]. Dropping the guard refreshes the
/// handle's local mirror from the store (best effort) and restores the prior
/// current log.
#[derive(Debug)]
pub struct LogScope {
    log: Log,
    token: Option<ActiveLogToken>,
}

impl LogScope {
    pub(crate) fn new(log: Log) -> Self {
        let token = state::with(|s| s.active_logs.push(log.clone()));
        Self {
            log,
            token: Some(token),
        }
    }

    /// The log this scope made current. The handle stays valid after the
    /// scope closes.
    pub fn log(&self) -> &Log {
        &self.log
    }
}

impl Drop for LogScope {
    fn drop(&mut self) {
        if let Err(err) = self.log.refresh() {
            warn!(log = %self.log.id(), error = %err, "failed to refresh log on scope exit");
        }
        if let Some(token) = self.token.take() {
            let popped = state::with(|s| s.active_logs.pop(token));
            if let Err(err) = popped {
                // Out-of-order exit is a structural bug in the caller, not a
                // runtime condition to recover from.
                if !thread::panicking() {
                    panic!("log scope dropped out of nesting order: {err}");
                }
                warn!(error = %err, "log scope dropped out of nesting order during unwind");
            }
        }
    }
}

/// The calling context's current log, if a [`LogScope`] is open.
pub fn current_log() -> Option<Log> {
    state::with(|s| s.active_logs.current().cloned())
}
