// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Scopelog - scoped context propagation and hierarchical logging.
//!
//! Structured logging built around nested scopes: a namespace path that
//! prefixes field keys, default-value overlays that ride along with every
//! log touched while they are open, an implicit "current log" register, and
//! timed span trees. Scope state is local to an execution context - threads
//! start fresh, while tasks wrapped with [`context::scoped`] inherit a
//! snapshot of their spawner's state at the spawn point.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (LogId, Fields, LogRecord, LogFilter, UpdateFn)
//! - [`error`] - Error types and result alias
//! - [`config`] - Client configuration and credential resolution
//! - [`context`] - Execution-context-local scope state and RAII guards
//! - [`log`] - The log handle: remote-first mutations over a local mirror
//! - [`trace`] - Nested timed span trees, persisted one log per root
//! - [`store`] - Log store and project registry traits, HTTP and in-memory backends
//! - [`cache`] - File-backed response cache keyed by canonical request JSON
//! - [`client`] - The entry point tying scopes, logs, and the store together
//!
//! # Example
//!
//! ```rust,ignore
//! use scopelog::{Client, ClientConfig, ContextScope, EntriesScope, fields};
//!
//! let client = Client::new(ClientConfig::default())?;
//!
//! let _ctx = ContextScope::enter("eval");
//! let _defaults = EntriesScope::enter(fields! { "suite" => "smoke" });
//!
//! // Creates a log with entries { "eval/suite": "smoke", "eval/score": 9 }.
//! client.log(fields! { "score" => 9 })?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod log;
pub mod store;
pub mod trace;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::ResponseCache;
pub use client::Client;
pub use config::ClientConfig;
pub use context::{
    current_log, current_path, scoped, ContextScope, EntriesScope, LogScope, ParamsScope, Scoped,
};
pub use error::{Error, Result};
pub use log::Log;
pub use store::{HttpStore, LogStore, MemoryStore, MutateOp, ProjectRegistry};
pub use trace::Span;
pub use types::{FieldMode, Fields, LogFilter, LogId, LogRecord, UpdateFn};

/// Scopelog version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let filter = LogFilter::with_fields(["score"]);
        let _mode = FieldMode::default();
        let _fields: Fields = fields! { "x" => 1 };
        let _ = filter;
    }
}
