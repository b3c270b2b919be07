// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client configuration and credential resolution.
//!
//! The credential is a single string token, supplied explicitly or resolved
//! from the `SCOPELOG_API_KEY` environment variable. Absence is a fatal
//! configuration error surfaced immediately as [`Error::Auth`] - never a
//! retryable condition.

use crate::error::{Error, Result};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SCOPELOG_API_KEY";

/// Default store base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.scopelog.dev/v1";

/// Project used when none is configured.
pub const DEFAULT_PROJECT: &str = "default";

/// Configuration for building a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Explicit API key. Falls back to [`API_KEY_ENV`] when `None`.
    pub api_key: Option<String>,
    /// Base URL of the log store.
    pub base_url: String,
    /// Project namespace logs are stored under.
    pub project: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            project: DEFAULT_PROJECT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Config for a named project with everything else defaulted.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// Set an explicit API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the store base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Resolve the API key from an explicit value or the process environment.
pub fn resolve_api_key(explicit: Option<&str>) -> Result<String> {
    if let Some(key) = explicit {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(Error::Auth(format!(
            "{API_KEY_ENV} is missing; set it or pass an explicit api_key"
        ))),
    }
}
