// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Nestable default-value overlay merged into logs touched while a scope is
//! active.
//!
//! Two independent instances live in each execution context: one for entries,
//! one for params. Nesting produces the union of all enclosing overlays with
//! inner values winning on key collision. A per-log "already synced" record
//! prevents re-sending unchanged defaults when the same log is touched again
//! inside an unchanged scope; it is cleared whenever the outermost overlay of
//! its kind closes.

use std::collections::{HashMap, HashSet};

use crate::types::{Fields, LogId};

/// Effective default mapping for one overlay kind in one execution context.
#[derive(Debug, Clone, Default)]
pub struct OverlayStack {
    effective: Fields,
    depth: u32,
    synced: HashMap<LogId, HashSet<String>>,
}

/// Token returned by [`OverlayStack::enter`], holding the prior mapping and
/// depth. Consumed by [`OverlayStack::exit`].
#[derive(Debug)]
pub struct OverlayToken {
    prev: Fields,
    prev_depth: u32,
}

impl OverlayStack {
    /// Merge already-qualified `values` over the current effective mapping
    /// (new keys win) and bump the nesting depth.
    pub fn enter(&mut self, values: Fields) -> OverlayToken {
        let token = OverlayToken {
            prev: self.effective.clone(),
            prev_depth: self.depth,
        };
        for (key, value) in values {
            self.effective.insert(key, value);
        }
        self.depth += 1;
        token
    }

    /// Restore the mapping and depth captured by `token`. Returning to zero
    /// nesting depth clears the synced record for this overlay kind.
    pub fn exit(&mut self, token: OverlayToken) {
        self.effective = token.prev;
        self.depth = token.prev_depth;
        if self.depth == 0 {
            self.synced.clear();
        }
    }

    /// The union of all enclosing overlays, innermost-wins.
    pub fn effective(&self) -> &Fields {
        &self.effective
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Scope-derived defaults not yet pushed to `id`.
    pub fn unsynced(&self, id: LogId) -> Fields {
        let seen = self.synced.get(&id);
        self.effective
            .iter()
            .filter(|(key, _)| seen.is_none_or(|s| !s.contains(*key)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Record `keys` as pushed to `id`.
    pub fn mark_synced(&mut self, id: LogId, keys: impl IntoIterator<Item = String>) {
        self.synced.entry(id).or_default().extend(keys);
    }
}
