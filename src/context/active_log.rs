// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Nested "current log" register used by the implicit logging form.
//!
//! An inner scoped log is distinct from, but a sibling of, the outer one;
//! implicit logging calls always resolve to the top of this stack.

use crate::error::{Error, Result};
use crate::log::Log;

/// Per-execution-context stack of live log handles.
#[derive(Debug, Clone, Default)]
pub struct ActiveLogStack {
    stack: Vec<Log>,
}

/// Token returned by [`ActiveLogStack::push`]; records the stack depth at
/// push time so out-of-order pops are detected.
#[derive(Debug)]
pub struct ActiveLogToken {
    depth: usize,
}

impl ActiveLogStack {
    /// Push a log handle, making it the current log.
    pub fn push(&mut self, log: Log) -> ActiveLogToken {
        let token = ActiveLogToken {
            depth: self.stack.len(),
        };
        self.stack.push(log);
        token
    }

    /// Pop the top entry, which must correspond to `token`. Popping out of
    /// nesting order is a programming error and fails loudly instead of
    /// silently corrupting the stack.
    pub fn pop(&mut self, token: ActiveLogToken) -> Result<Log> {
        if self.stack.len() != token.depth + 1 {
            return Err(Error::DuplicateScopeExit(format!(
                "log scope token for depth {} popped at depth {}",
                token.depth + 1,
                self.stack.len(),
            )));
        }
        self.stack.pop().ok_or_else(|| {
            Error::DuplicateScopeExit("log scope popped on empty stack".to_string())
        })
    }

    /// The current log, if any scope is open.
    pub fn current(&self) -> Option<&Log> {
        self.stack.last()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
