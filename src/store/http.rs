// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP-backed log store.
//!
//! Thin request-dispatch client over the store's REST surface. Calls are
//! blocking because the engine presents persistence as synchronous; no
//! process-wide lock is ever held across a request. No retries here - the
//! service's own policy applies.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{LogStore, MutateOp, ProjectRegistry};
use crate::types::{Fields, LogFilter, LogId, LogRecord};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// HTTP [`LogStore`] and [`ProjectRegistry`] implementation.
pub struct HttpStore {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct CreateLogBody<'a> {
    project: &'a str,
    entries: &'a Fields,
    params: &'a Fields,
    skip_duplicates: bool,
}

#[derive(Deserialize)]
struct CreateLogResponse {
    id: LogId,
}

#[derive(Serialize)]
struct CreateProjectBody<'a> {
    name: &'a str,
}

impl HttpStore {
    /// Create a store client for `base_url` authenticated with `api_key`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| Error::store(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a response to an error for non-2xx statuses.
    fn check(&self, response: Response, log_id: Option<LogId>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(body),
            StatusCode::NOT_FOUND => match log_id {
                Some(id) => Error::LogNotFound(id),
                None => Error::store_status(body, status.as_u16()),
            },
            StatusCode::UNPROCESSABLE_ENTITY => Error::MissingKey(body),
            _ => Error::store_status(body, status.as_u16()),
        })
    }

    fn transport(err: reqwest::Error) -> Error {
        Error::store(err.to_string())
    }
}

impl LogStore for HttpStore {
    fn create_log(
        &self,
        project: &str,
        entries: &Fields,
        params: &Fields,
        skip_duplicates: bool,
    ) -> Result<LogId> {
        debug!(project, skip_duplicates, "creating log");
        let response = self
            .client
            .post(self.url("/logs"))
            .bearer_auth(&self.api_key)
            .json(&CreateLogBody {
                project,
                entries,
                params,
                skip_duplicates,
            })
            .send()
            .map_err(Self::transport)?;
        let body: CreateLogResponse = self
            .check(response, None)?
            .json()
            .map_err(Self::transport)?;
        Ok(body.id)
    }

    fn get_log(&self, id: LogId) -> Result<LogRecord> {
        let response = self
            .client
            .get(self.url(&format!("/logs/{id}")))
            .bearer_auth(&self.api_key)
            .send()
            .map_err(Self::transport)?;
        self.check(response, Some(id))?
            .json()
            .map_err(Self::transport)
    }

    fn mutate_log(&self, id: LogId, op: MutateOp) -> Result<()> {
        debug!(%id, "mutating log");
        let response = self
            .client
            .patch(self.url(&format!("/logs/{id}")))
            .bearer_auth(&self.api_key)
            .json(&op)
            .send()
            .map_err(Self::transport)?;
        self.check(response, Some(id)).map(|_| ())
    }

    fn delete_log(&self, id: LogId) -> Result<()> {
        debug!(%id, "deleting log");
        let response = self
            .client
            .delete(self.url(&format!("/logs/{id}")))
            .bearer_auth(&self.api_key)
            .send()
            .map_err(Self::transport)?;
        self.check(response, Some(id)).map(|_| ())
    }

    fn list_logs(&self, project: &str, filter: Option<&LogFilter>) -> Result<Vec<LogRecord>> {
        let mut request = self
            .client
            .get(self.url("/logs"))
            .bearer_auth(&self.api_key)
            .query(&[("project", project)]);
        if let Some(filter) = filter {
            let encoded = serde_json::to_string(filter)
                .map_err(|err| Error::store(format!("unencodable filter: {err}")))?;
            request = request.query(&[("filter", encoded.as_str())]);
        }
        let response = request.send().map_err(Self::transport)?;
        self.check(response, None)?
            .json()
            .map_err(Self::transport)
    }
}

impl ProjectRegistry for HttpStore {
    fn exists(&self, name: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.url(&format!("/projects/{name}")))
            .bearer_auth(&self.api_key)
            .send()
            .map_err(Self::transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.check(response, None).map(|_| true)
    }

    fn create(&self, name: &str) -> Result<()> {
        debug!(project = name, "creating project");
        let response = self
            .client
            .post(self.url("/projects"))
            .bearer_auth(&self.api_key)
            .json(&CreateProjectBody { name })
            .send()
            .map_err(Self::transport)?;
        self.check(response, None).map(|_| ())
    }
}
