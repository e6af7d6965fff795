// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Compute Engine v1 REST client.
//!
//! Thin `reqwest` binding of the endpoints the bastion reconciler needs. Every
//! request carries a bearer token taken from a [`TokenSource`]; obtaining and
//! refreshing that token (workload identity, metadata server, service account
//! exchange) happens outside this crate.
//!
//! Mutations return once their long-running operation is `DONE`. Compute
//! Engine accepts a delete long before the resource is released, so without
//! the wait an instance delete would race the delete of its boot disk.

use super::types::{Disk, Firewall, FirewallPatch, Instance, Operation, Zone, ZoneList};
use super::ComputeClient;
use crate::constants::{
    COMPUTE_HTTP_TIMEOUT_SECS, COMPUTE_LIST_PAGE_SIZE, COMPUTE_OPERATION_POLL_INTERVAL_SECS,
};
use crate::errors::ComputeError;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Where the bearer token for Compute Engine requests comes from.
#[derive(Clone, Debug)]
pub enum TokenSource {
    /// Send requests unauthenticated (emulators, tests)
    Anonymous,
    /// A fixed token
    Static(String),
    /// A file re-read on every request, so rotated tokens are picked up
    File(PathBuf),
}

impl TokenSource {
    async fn token(&self) -> Result<Option<String>, ComputeError> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Static(token) => Ok(Some(token.clone())),
            Self::File(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ComputeError::TokenUnavailable(format!("{}: {e}", path.display()))
                })?;
                let token = raw.trim();
                if token.is_empty() {
                    return Err(ComputeError::TokenUnavailable(format!(
                        "{} is empty",
                        path.display()
                    )));
                }
                Ok(Some(token.to_string()))
            }
        }
    }
}

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// [`ComputeClient`] backed by the Compute Engine REST API.
#[derive(Clone, Debug)]
pub struct RestComputeClient {
    http: HttpClient,
    base_url: Url,
    token: TokenSource,
    poll_interval: Duration,
}

impl RestComputeClient {
    /// Create a client for `base_url` (e.g. `https://compute.googleapis.com/compute/v1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: Url, token: TokenSource) -> Result<Self, ComputeError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(COMPUTE_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|source| ComputeError::Transport {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self::with_http_client(http, base_url, token))
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(http: HttpClient, base_url: Url, token: TokenSource) -> Self {
        Self {
            http,
            base_url,
            token,
            poll_interval: Duration::from_secs(COMPUTE_OPERATION_POLL_INTERVAL_SECS),
        }
    }

    /// Pause between two polls of a pending operation.
    #[must_use]
    pub fn with_operation_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), ComputeError> {
        debug!(method = %method, url = %url, "Compute API request");

        let mut request = self.http.request(method, url.clone());
        if let Some(token) = self.token.token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ComputeError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ComputeError::Transport {
                url: url.to_string(),
                source,
            })?;

        debug!(url = %url, status = %status, "Compute API response");
        Ok((status, text))
    }

    fn api_error(url: &Url, status: StatusCode, body: &str) -> ComputeError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        ComputeError::Api {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        }
    }

    fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T, ComputeError> {
        serde_json::from_str(body).map_err(|e| ComputeError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn check(url: &Url, status: StatusCode, body: &str) -> Result<(), ComputeError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::api_error(url, status, body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ComputeError> {
        let (status, body) = self.send::<()>(Method::GET, url.clone(), None).await?;
        match Self::check(&url, status, &body) {
            Ok(()) => Self::decode(&url, &body).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send a mutation and wait for its operation, polled under `scope`.
    async fn mutate<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        scope: &[&str],
    ) -> Result<Operation, ComputeError> {
        let (status, text) = self.send(method, url.clone(), Some(body)).await?;
        Self::check(&url, status, &text)?;
        let operation = Self::decode(&url, &text)?;
        self.wait_for_operation(scope, operation).await
    }

    /// Delete and wait until the resource is released. `Ok(false)` if the
    /// resource did not exist.
    async fn delete(&self, url: Url, scope: &[&str]) -> Result<bool, ComputeError> {
        let (status, body) = self.send::<()>(Method::DELETE, url.clone(), None).await?;
        match Self::check(&url, status, &body) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        }
        let operation = Self::decode(&url, &body)?;
        self.wait_for_operation(scope, operation).await?;
        Ok(true)
    }

    /// Poll `<scope>/operations/<name>` until the operation is `DONE`.
    ///
    /// There is no deadline here; callers bound the wait with their own
    /// timeout or cancellation.
    async fn wait_for_operation(
        &self,
        scope: &[&str],
        mut operation: Operation,
    ) -> Result<Operation, ComputeError> {
        let name = operation.name.clone().unwrap_or_default();
        let mut segments = scope.to_vec();
        segments.extend(["operations", name.as_str()]);
        let url = self.url(&segments);

        let mut polls = 0u32;
        while !operation.is_done() {
            if name.is_empty() {
                return Err(ComputeError::Decode {
                    url: url.to_string(),
                    reason: "pending operation has no name".to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            operation = self.get(url.clone()).await?.ok_or_else(|| ComputeError::Api {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("operation {name} not found"),
            })?;
            debug!(
                operation = %name,
                status = ?operation.status,
                polls,
                "Polled compute operation"
            );
        }

        match operation.error_message() {
            Some(message) => Err(ComputeError::OperationFailed {
                url: url.to_string(),
                message,
            }),
            None => Ok(operation),
        }
    }
}

#[async_trait]
impl ComputeClient for RestComputeClient {
    async fn get_firewall(
        &self,
        project: &str,
        name: &str,
    ) -> Result<Option<Firewall>, ComputeError> {
        self.get(self.url(&["projects", project, "global", "firewalls", name]))
            .await
    }

    async fn insert_firewall(
        &self,
        project: &str,
        firewall: &Firewall,
    ) -> Result<Operation, ComputeError> {
        let url = self.url(&["projects", project, "global", "firewalls"]);
        self.mutate(Method::POST, url, firewall, &["projects", project, "global"])
            .await
    }

    async fn patch_firewall(
        &self,
        project: &str,
        name: &str,
        patch: &FirewallPatch,
    ) -> Result<Operation, ComputeError> {
        let url = self.url(&["projects", project, "global", "firewalls", name]);
        self.mutate(Method::PATCH, url, patch, &["projects", project, "global"])
            .await
    }

    async fn delete_firewall(&self, project: &str, name: &str) -> Result<bool, ComputeError> {
        let url = self.url(&["projects", project, "global", "firewalls", name]);
        self.delete(url, &["projects", project, "global"]).await
    }

    async fn get_disk(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Disk>, ComputeError> {
        self.get(self.url(&["projects", project, "zones", zone, "disks", name]))
            .await
    }

    async fn insert_disk(
        &self,
        project: &str,
        zone: &str,
        disk: &Disk,
    ) -> Result<Operation, ComputeError> {
        let url = self.url(&["projects", project, "zones", zone, "disks"]);
        self.mutate(Method::POST, url, disk, &["projects", project, "zones", zone])
            .await
    }

    async fn delete_disk(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<bool, ComputeError> {
        let url = self.url(&["projects", project, "zones", zone, "disks", name]);
        self.delete(url, &["projects", project, "zones", zone]).await
    }

    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Instance>, ComputeError> {
        self.get(self.url(&["projects", project, "zones", zone, "instances", name]))
            .await
    }

    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, ComputeError> {
        let url = self.url(&["projects", project, "zones", zone, "instances"]);
        self.mutate(Method::POST, url, instance, &["projects", project, "zones", zone])
            .await
    }

    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<bool, ComputeError> {
        let url = self.url(&["projects", project, "zones", zone, "instances", name]);
        self.delete(url, &["projects", project, "zones", zone]).await
    }

    /// List the zones of a region, following `nextPageToken` until exhausted.
    async fn list_zones(&self, project: &str, region: &str) -> Result<Vec<Zone>, ComputeError> {
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            page_count += 1;
            let mut url = self.url(&["projects", project, "zones"]);
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("maxResults", &COMPUTE_LIST_PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: ZoneList = self.get(url.clone()).await?.ok_or_else(|| ComputeError::Api {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("project {project} not found"),
            })?;

            let item_count = page.items.len();
            zones.extend(page.items.into_iter().filter(|zone| zone.in_region(region)));

            debug!(
                page = page_count,
                items_in_page = item_count,
                matching_zones = zones.len(),
                "Fetched zone page from Compute API"
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(zones)
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod rest_tests;
