use std::time::Duration;

use anyhow::{Context, Result};
use dorsey_core::{DorseyError, RegistryConfig};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use semver::Version;

use crate::document::{PackageDocument, VersionManifest};
use crate::source::VersionSource;

const USER_AGENT: &str = concat!("dorsey-cli/", env!("CARGO_PKG_VERSION"));

/// Read-only client for an npm-compatible registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    download_timeout: Duration,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration, download_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build registry HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            download_timeout,
        })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(
            config.source.base_url(),
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.download_timeout_secs),
        )
    }

    /// Same client pointed at another registry, e.g. a mirror.
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            download_timeout: self.download_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    /// `GET {registry}/{name}`; anything but 200 is `RegistryUnavailable`.
    pub fn package_document(&self, name: &str) -> Result<PackageDocument> {
        let url = self.package_url(name);
        tracing::debug!(%url, "querying registry");
        let body = self.get_ok_text(name, &url)?;
        serde_json::from_str(&body).map_err(|err| {
            self.unavailable(name, format!("invalid package document from {url}: {err}"))
        })
    }

    /// `GET {registry}/{name}/{version}` for the tarball location.
    pub fn version_manifest(&self, name: &str, version: &Version) -> Result<VersionManifest> {
        let url = format!("{}/{}", self.package_url(name), version);
        tracing::debug!(%url, "querying version manifest");
        let body = self.get_ok_text(name, &url)?;
        serde_json::from_str(&body).map_err(|err| {
            self.unavailable(name, format!("invalid version manifest from {url}: {err}"))
        })
    }

    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(%url, "downloading tarball");
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .with_context(|| format!("failed to download {url}"))?;
        let status = response.status();
        if status != StatusCode::OK {
            anyhow::bail!("download of {url} failed with HTTP {status}");
        }
        let bytes = response
            .bytes()
            .with_context(|| format!("failed reading response body from {url}"))?;
        Ok(bytes.to_vec())
    }

    fn get_ok_text(&self, name: &str, url: &str) -> Result<String> {
        let response: Response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(|err| self.unavailable(name, format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(self.unavailable(name, format!("{url} answered HTTP {status}")));
        }
        response
            .text()
            .map_err(|err| self.unavailable(name, format!("failed reading {url}: {err}")))
    }

    fn unavailable(&self, name: &str, reason: String) -> anyhow::Error {
        DorseyError::RegistryUnavailable {
            package: name.to_string(),
            registry: self.base_url.clone(),
            reason,
        }
        .into()
    }
}

impl VersionSource for RegistryClient {
    fn registry_url(&self) -> &str {
        &self.base_url
    }

    fn fetch_versions(&self, name: &str) -> Result<Vec<String>> {
        let document = self.package_document(name)?;
        Ok(document.version_keys())
    }
}
