// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Execution-context-local scope state and the guards that manage it.
//!
//! State is keyed by execution context: every OS thread starts from default
//! state, and a task wrapped with [`scoped`] runs on a snapshot of its
//! spawner's state taken at the spawn point. See the submodules for the
//! individual pieces: the namespace path, the entries/params overlays, the
//! active-log stack, and the scope guards that drive them.

pub mod active_log;
mod future;
pub mod overlay;
pub mod path;
pub mod scopes;
pub(crate) mod state;

pub use future::{scoped, Scoped};
pub use scopes::{
    current_log, current_path, ContextScope, EntriesScope, LogScope, ParamsScope,
};
