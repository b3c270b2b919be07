// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core type definitions shared across the crate.
//!
//! - [`LogId`] - opaque store-assigned log identifier
//! - [`Fields`] - the key/value mapping attached to logs (entries and params)
//! - [`LogRecord`] - the detached, serializable form of a log
//! - [`LogFilter`] - predicate for listing logs
//! - [`UpdateFn`] - combinator(s) applied by `update_entries`/`update_params`

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Opaque identifier assigned by the log store on first successful creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key/value mapping attached to a log.
///
/// `serde_json::Map` keeps keys in sorted order by default, which gives the
/// crate stable serialization everywhere field maps are written out.
pub type Fields = serde_json::Map<String, Value>;

/// Build a [`Fields`] map from `key => value` pairs.
///
/// Values go through [`serde_json::json!`], so anything JSON-serializable
/// works on the right-hand side. Each value must parse as a Rust expression;
/// for JSON object literals, build the value with `json!(...)` at the call
/// site.
///
/// # Example
///
/// ```rust,ignore
/// let entries = fields! { "score" => 1.0, "tags" => ["a", "b"] };
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Fields::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )+
        map
    }};
}

/// Detached, serializable form of a log as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: LogId,
    pub project: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub entries: Fields,
    #[serde(default)]
    pub params: Fields,
}

/// How a multi-field predicate combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMode {
    /// Every listed field must match.
    #[default]
    All,
    /// At least one listed field must match.
    Any,
}

/// Predicate for selecting logs from the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    /// Fields that must be present (per [`FieldMode`]) in entries or params.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with_fields: Vec<String>,
    /// Fields that must all be absent from entries and params.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub without_fields: Vec<String>,
    #[serde(default)]
    pub mode: FieldMode,
    /// Exact value-equality match on the entries mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_equal: Option<Fields>,
}

impl LogFilter {
    /// Require the listed fields to be present.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            with_fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Require the listed fields to be absent.
    pub fn without_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            without_fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Require the entries mapping to equal `entries` exactly.
    pub fn entries_equal(entries: Fields) -> Self {
        Self {
            entries_equal: Some(entries),
            ..Self::default()
        }
    }

    /// Set the combination mode for `with_fields`.
    pub fn mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    /// Evaluate the predicate against a record.
    pub fn matches(&self, record: &LogRecord) -> bool {
        let has = |key: &String| {
            record.entries.contains_key(key) || record.params.contains_key(key)
        };
        if !self.with_fields.is_empty() {
            let ok = match self.mode {
                FieldMode::All => self.with_fields.iter().all(has),
                FieldMode::Any => self.with_fields.iter().any(has),
            };
            if !ok {
                return false;
            }
        }
        if self.without_fields.iter().any(has) {
            return false;
        }
        if let Some(expected) = &self.entries_equal {
            if &record.entries != expected {
                return false;
            }
        }
        true
    }
}

/// Value combinator(s) for `update_entries` / `update_params`.
///
/// Either one function applied to every key in the delta, or a per-key map.
/// A per-key map lacking a function for some delta key fails the whole
/// operation with [`Error::MissingUpdateFn`].
pub enum UpdateFn<'f> {
    All(Box<dyn Fn(&Value, &Value) -> Value + 'f>),
    PerKey(HashMap<String, Box<dyn Fn(&Value, &Value) -> Value + 'f>>),
}

impl<'f> UpdateFn<'f> {
    /// One combinator for every key.
    pub fn all(f: impl Fn(&Value, &Value) -> Value + 'f) -> Self {
        Self::All(Box::new(f))
    }

    /// Per-key combinators.
    pub fn per_key(
        fns: impl IntoIterator<Item = (String, Box<dyn Fn(&Value, &Value) -> Value + 'f>)>,
    ) -> Self {
        Self::PerKey(fns.into_iter().collect())
    }

    /// Resolve the combinator for `key`.
    pub(crate) fn resolve(&self, key: &str) -> Result<&(dyn Fn(&Value, &Value) -> Value + 'f)> {
        match self {
            Self::All(f) => Ok(f.as_ref()),
            Self::PerKey(map) => map
                .get(key)
                .map(|f| f.as_ref())
                .ok_or_else(|| Error::MissingUpdateFn(key.to_string())),
        }
    }
}
