use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::http::HttpClient;

/// Package name to archive filenames, as returned by `GET /cip/packages`.
pub type PackageListing = BTreeMap<String, Vec<String>>;

/// Requests against a registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Uploads archive bytes under `filename`. Returns the server's message.
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        package_name: &str,
        version: &str,
    ) -> Result<String>;

    async fn download(&self, package_name: &str, version: &str, filename: &str) -> Result<Vec<u8>>;

    async fn list(&self) -> Result<PackageListing>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    message: String,
}

/// HTTP implementation of [`RegistryTransport`].
pub struct RegistryClient {
    http: HttpClient,
    base_url: String,
}

impl RegistryClient {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url_with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid registry URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Registry URL cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl RegistryTransport for RegistryClient {
    #[tracing::instrument(skip(self, bytes))]
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        package_name: &str,
        version: &str,
    ) -> Result<String> {
        let url = format!("{}/cip/upload", self.base_url);
        info!("Uploading {} ({} bytes) to {}", filename, bytes.len(), url);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("package_name", package_name.to_string())
            .text("package_version", version.to_string());

        let response: UploadResponse = self.http.post_multipart(&url, form).await?;
        Ok(response.message)
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, package_name: &str, version: &str, filename: &str) -> Result<Vec<u8>> {
        let url = self.url_with_segments(&["download", package_name, version, filename])?;
        debug!("Downloading {}", url);
        self.http.get_bytes(url.as_str()).await
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<PackageListing> {
        let url = format!("{}/cip/packages", self.base_url);
        self.http.get_json(&url).await
    }
}
