// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Nested timed span trees.
//!
//! Each execution context carries one span stack. The first span entered
//! while the stack is empty becomes the root and fixes the context's
//! running-time origin; nested spans record their offset relative to it.
//! When the root completes it is persisted as exactly one log (duplicate
//! detection skipped, so every execution produces a new record); completed
//! descendants are appended into their parent's owned child list and travel
//! inside the root's record.
//!
//! Error capture records the failure's description into the span and then
//! re-propagates the original failure unchanged.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::client::Client;
use crate::context::state;
use crate::error::{Error, Result};
use crate::types::Fields;

/// One timed node in a call tree.
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub span_name: String,
    pub timestamp: DateTime<Utc>,
    /// Elapsed seconds, rounded to two decimal places. `None` while running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_time: Option<f64>,
    /// Seconds since the root span's start; `0` for the root itself.
    pub offset: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_spans: Vec<Span>,
}

fn round2(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Per-execution-context span state: the active chain plus the running-time
/// origin established by the root.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanStack {
    stack: Vec<Span>,
    origin: Option<Instant>,
}

impl SpanStack {
    /// Open a span under the current parent (or as root) and return its id.
    pub(crate) fn begin(&mut self, name: &str, inputs: Option<Value>, now: Instant) -> String {
        let offset = match self.origin {
            Some(origin) if !self.stack.is_empty() => {
                round2(now.duration_since(origin).as_secs_f64())
            }
            _ => {
                self.origin = Some(now);
                0.0
            }
        };
        let span = Span {
            id: Uuid::new_v4().to_string(),
            parent_span_id: self.stack.last().map(|parent| parent.id.clone()),
            span_name: name.to_string(),
            timestamp: Utc::now(),
            exec_time: None,
            offset,
            inputs,
            outputs: None,
            errors: None,
            child_spans: Vec::new(),
        };
        let id = span.id.clone();
        self.stack.push(span);
        id
    }

    /// Record a failure description into the active span.
    pub(crate) fn record_error(&mut self, message: String) {
        if let Some(active) = self.stack.last_mut() {
            active.errors = Some(message);
        }
    }

    /// Close the active span. Returns the completed root when this was the
    /// outermost span; otherwise the span is appended to its parent.
    pub(crate) fn finish(&mut self, elapsed: Duration, outputs: Option<Value>) -> Option<Span> {
        let mut span = self.stack.pop()?;
        span.exec_time = Some(round2(elapsed.as_secs_f64()));
        if span.errors.is_none() {
            span.outputs = outputs;
        }
        match self.stack.last_mut() {
            Some(parent) => {
                parent.child_spans.push(span);
                None
            }
            None => {
                self.origin = None;
                Some(span)
            }
        }
    }

    /// Discard the active span if it is `id`. Used when the traced unit
    /// unwinds or its future is dropped mid-flight.
    pub(crate) fn abort(&mut self, id: &str) {
        if self.stack.last().is_some_and(|span| span.id == id) {
            self.stack.pop();
            if self.stack.is_empty() {
                self.origin = None;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

// Restores the span stack when a traced unit unwinds or is cancelled without
// reaching the finish path. Checks the span id so a guard dropped in a
// different execution context never pops someone else's span.
struct AbortGuard {
    span_id: String,
    armed: bool,
}

impl AbortGuard {
    fn new(span_id: String) -> Self {
        Self { span_id, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            state::with(|s| s.spans.abort(&self.span_id));
        }
    }
}

impl Client {
    /// Run `f` as a traced span named `name`.
    ///
    /// `inputs` enables I/O capture: when `Some`, the inputs snapshot is
    /// recorded and, on success, the serialized return value is recorded as
    /// outputs; when `None`, neither is captured. A failing unit has its
    /// error description recorded into the span and the error is returned
    /// unchanged. Completion of the outermost span persists the whole tree
    /// as one log.
    pub fn traced<T, E, F>(
        &self,
        name: &str,
        inputs: Option<Value>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        T: Serialize,
        E: fmt::Display,
    {
        let started = Instant::now();
        let capture = inputs.is_some();
        let span_id = state::with(|s| s.spans.begin(name, inputs, started));

        let mut guard = AbortGuard::new(span_id);
        let result = f();
        guard.disarm();

        self.finish_span(started, capture, &result);
        result
    }

    /// Async form of [`Client::traced`]; the span covers the whole future.
    ///
    /// The future runs in the calling execution context. To trace work
    /// spawned as an independent task, wrap the task with
    /// [`crate::context::scoped`] so it inherits the active span chain as of
    /// the spawn point.
    pub async fn traced_async<T, E, Fut>(
        &self,
        name: &str,
        inputs: Option<Value>,
        fut: Fut,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: fmt::Display,
    {
        let started = Instant::now();
        let capture = inputs.is_some();
        let span_id = state::with(|s| s.spans.begin(name, inputs, started));

        let mut guard = AbortGuard::new(span_id);
        let result = fut.await;
        guard.disarm();

        self.finish_span(started, capture, &result);
        result
    }

    fn finish_span<T: Serialize, E: fmt::Display>(
        &self,
        started: Instant,
        capture: bool,
        result: &std::result::Result<T, E>,
    ) {
        let outputs = match result {
            Ok(value) if capture => match serde_json::to_value(value) {
                Ok(outputs) => Some(outputs),
                Err(err) => {
                    warn!(error = %err, "span outputs not serializable");
                    None
                }
            },
            _ => None,
        };
        if let Err(err) = result {
            state::with(|s| s.spans.record_error(err.to_string()));
        }
        let completed_root = state::with(|s| s.spans.finish(started.elapsed(), outputs));
        if let Some(root) = completed_root {
            if let Err(err) = self.persist_trace(root) {
                warn!(error = %err, "failed to persist trace");
            }
        }
    }

    fn persist_trace(&self, root: Span) -> Result<()> {
        let trace = serde_json::to_value(&root)
            .map_err(|err| Error::store(format!("unserializable span tree: {err}")))?;
        let mut entries = Fields::new();
        entries.insert("trace".to_string(), trace);
        self.create_log(entries, Fields::new(), false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.123), 0.12);
        assert_eq!(round2(0.999), 1.0);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_root_then_children() {
        let mut spans = SpanStack::default();
        let origin = Instant::now();
        spans.begin("root", None, origin);
        spans.begin("child", None, origin + Duration::from_millis(500));
        assert!(spans.finish(Duration::from_millis(100), None).is_none());

        let root = spans
            .finish(Duration::from_millis(700), None)
            .expect("root span");
        assert!(root.parent_span_id.is_none());
        assert_eq!(root.offset, 0.0);
        assert_eq!(root.child_spans.len(), 1);

        let child = &root.child_spans[0];
        assert_eq!(child.parent_span_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(child.offset, 0.5);
        assert_eq!(child.exec_time, Some(0.1));
        assert!(spans.is_empty());
    }

    #[test]
    fn test_error_suppresses_outputs() {
        let mut spans = SpanStack::default();
        spans.begin("failing", None, Instant::now());
        spans.record_error("Something went wrong".to_string());
        let root = spans
            .finish(Duration::from_millis(10), Some(serde_json::json!(1)))
            .expect("root span");
        assert_eq!(root.errors.as_deref(), Some("Something went wrong"));
        assert!(root.outputs.is_none());
    }

    #[test]
    fn test_abort_restores_origin() {
        let mut spans = SpanStack::default();
        let id = spans.begin("root", None, Instant::now());
        spans.abort(&id);
        assert!(spans.is_empty());

        // Next root starts a fresh origin and zero offset.
        let start = Instant::now() + Duration::from_secs(5);
        spans.begin("next", None, start);
        let root = spans.finish(Duration::from_millis(1), None).unwrap();
        assert_eq!(root.offset, 0.0);
    }

    #[test]
    fn test_abort_ignores_foreign_ids() {
        let mut spans = SpanStack::default();
        spans.begin("root", None, Instant::now());
        spans.abort("not-the-active-span");
        assert!(!spans.is_empty());
        let _ = spans.finish(Duration::from_millis(1), None);
    }

    #[test]
    fn test_span_serialization_prunes_nulls() {
        let mut spans = SpanStack::default();
        spans.begin("root", None, Instant::now());
        let root = spans.finish(Duration::from_millis(1), None).unwrap();
        let json = serde_json::to_value(&root).unwrap();

        assert!(json.get("parent_span_id").is_none());
        assert!(json.get("outputs").is_none());
        assert!(json.get("errors").is_none());
        assert!(json.get("child_spans").is_none());
        assert_eq!(json["span_name"], "root");
        assert_eq!(json["offset"], 0.0);
    }
}
