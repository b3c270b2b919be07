// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-execution-context state table.
//!
//! Each execution context (OS thread or cooperative task) owns one
//! [`ScopeState`]: the namespace path, the entries and params overlays, the
//! active-log stack, and the span stack. Thread spawn starts from default
//! state - there is no inheritance hook for preemptible threads. Task spawn
//! inherits by snapshot: [`snapshot`] clones the spawner's state at the
//! instant of spawn and [`crate::context::Scoped`] installs the copy around
//! every poll, so a task's mutations are invisible to the spawner and to
//! sibling tasks.

use std::cell::RefCell;

use crate::context::active_log::ActiveLogStack;
use crate::context::overlay::OverlayStack;
use crate::context::path::NamespacePath;
use crate::trace::SpanStack;

/// The complete context-local state for one execution context.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScopeState {
    pub(crate) path: NamespacePath,
    pub(crate) entries: OverlayStack,
    pub(crate) params: OverlayStack,
    pub(crate) active_logs: ActiveLogStack,
    pub(crate) spans: SpanStack,
}

thread_local! {
    static STATE: RefCell<ScopeState> = RefCell::new(ScopeState::default());
}

/// Run `f` with mutable access to the calling context's state.
///
/// `f` must not re-enter the context machinery or perform store calls; all
/// callers gather what they need, drop the borrow, then do remote work.
pub(crate) fn with<R>(f: impl FnOnce(&mut ScopeState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Immutable snapshot of the current context's state, taken at task-spawn
/// points.
pub(crate) fn snapshot() -> ScopeState {
    STATE.with(|state| state.borrow().clone())
}

/// Replace the calling context's state, returning the previous state.
pub(crate) fn swap(next: ScopeState) -> ScopeState {
    STATE.with(|state| std::mem::replace(&mut *state.borrow_mut(), next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn test_fresh_context_is_default() {
        with(|state| {
            assert!(state.path.is_empty());
            assert!(state.entries.effective().is_empty());
            assert!(state.params.effective().is_empty());
            assert!(state.active_logs.is_empty());
            assert!(state.spans.is_empty());
        });
    }

    #[test]
    fn test_thread_spawn_never_inherits() {
        let token = with(|state| {
            state.entries.enter(fields! { "inherited?" => true })
        });

        let handle = std::thread::spawn(|| with(|state| state.entries.effective().clone()));
        let seen = handle.join().unwrap();
        assert!(seen.is_empty());

        with(|state| state.entries.exit(token));
    }

    #[test]
    fn test_snapshot_is_isolated_copy() {
        let token = with(|state| state.path.push("outer"));

        let mut copy = snapshot();
        let _inner = copy.path.push("inner");
        // Mutating the copy leaves the live context untouched.
        with(|state| assert_eq!(state.path.as_str(), "outer"));
        assert_eq!(copy.path.as_str(), "outer/inner");

        with(|state| state.path.pop(token));
    }

    #[test]
    fn test_swap_roundtrip() {
        let token = with(|state| state.path.push("swapped-out"));

        let prev = swap(ScopeState::default());
        with(|state| assert!(state.path.is_empty()));
        let blank = swap(prev);
        assert!(blank.path.is_empty());
        with(|state| assert_eq!(state.path.as_str(), "swapped-out"));

        with(|state| state.path.pop(token));
    }
}
