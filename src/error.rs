// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the scopelog SDK.
//!
//! One crate-wide enum covers the full taxonomy: credential failures,
//! store/transport failures, key-level failures on field operations, and the
//! scope-nesting programming error. Everything propagates to the immediate
//! caller uncaught; the only place an error is recorded rather than returned
//! is span error capture, which stores the message and re-propagates the
//! original failure unchanged.

use thiserror::Error;

use crate::types::LogId;

/// Errors that can occur during logging and context operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid credential. Fatal, surfaced immediately, never
    /// retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport or server failure on a persistence call. Not retried here;
    /// retry policy belongs to the store collaborator.
    #[error("store error: {message}")]
    Store {
        message: String,
        status_code: Option<u16>,
    },

    /// A referenced entry/param key is absent on a rename, update, or delete.
    #[error("missing key: {0}")]
    MissingKey(String),

    /// A per-key update-function map lacks an entry for a key in the delta.
    #[error("no update function for key: {0}")]
    MissingUpdateFn(String),

    /// A scope token was exited out of nesting order. Programming error.
    #[error("scope exited out of order: {0}")]
    DuplicateScopeExit(String),

    /// Operation on a deleted or unknown log identifier.
    #[error("log not found: {0}")]
    LogNotFound(LogId),

    /// Response cache I/O or serialization failure.
    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Create a store error without a status code.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a store error with an HTTP status code.
    pub fn store_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Store {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Check whether this is an authentication failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Check whether this is a key-level failure on a field operation.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Self::MissingKey(_))
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_helpers() {
        let err = Error::store("connection reset");
        assert!(matches!(err, Error::Store { status_code: None, .. }));

        let err = Error::store_status("bad gateway", 502);
        assert!(matches!(
            err,
            Error::Store {
                status_code: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn test_display() {
        let err = Error::MissingKey("customer".to_string());
        assert_eq!(err.to_string(), "missing key: customer");
        assert!(err.is_missing_key());

        let err = Error::Auth("SCOPELOG_API_KEY is not set".to_string());
        assert!(err.is_auth());
        assert!(err.to_string().starts_with("authentication failed"));
    }

    #[test]
    fn test_log_not_found_display() {
        let err = Error::LogNotFound(LogId(7));
        assert_eq!(err.to_string(), "log not found: 7");
    }
}
