use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::models::{
    BackendsResponse, CleanRequest, CleanResponse, DocstringEditRequest, DocstringEditResponse,
    ResolveRequest, ResolveResponse,
};

/// HTTP client that delegates resolver requests to a running `docres`
/// daemon.
pub struct HttpResolverBackend {
    client: Client,
    base_url: String,
}

impl HttpResolverBackend {
    /// Create a new HTTP backend targeting the given base URL
    /// (e.g. "http://127.0.0.1:7979").
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// `POST /v1/resolve`.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse> {
        self.post_json("/v1/resolve", request)
    }

    /// `POST /v1/clean`.
    pub fn clean(&self, request: &CleanRequest) -> Result<CleanResponse> {
        self.post_json("/v1/clean", request)
    }

    /// `POST /v1/docstring/edit`.
    pub fn docstring_edit(&self, request: &DocstringEditRequest) -> Result<DocstringEditResponse> {
        self.post_json("/v1/docstring/edit", request)
    }

    /// `GET /v1/backends`.
    pub fn backends(&self) -> Result<BackendsResponse> {
        let url = self.url_for("/v1/backends");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?
            .error_for_status()
            .with_context(|| format!("server returned error for {}", url))?;

        response
            .json::<BackendsResponse>()
            .context("failed to decode JSON response from server")
    }

    fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = self.url_for(path);
        tracing::debug!(%url, "delegating request to daemon");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .ok()
                .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            anyhow::bail!("server returned error for {}: {}", url, message);
        }

        let value = response
            .json::<R>()
            .context("failed to decode JSON response from server")?;

        Ok(value)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
