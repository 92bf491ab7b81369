//! Thin HTTP client with registry error handling.

use anyhow::{Context, Result};
use log::debug;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::status::{check_status, transport_error};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);
        let response = self.send(self.client.get(url)).await?;
        response
            .json::<T>()
            .await
            .context("Failed to parse JSON response")
    }

    /// Performs a GET request and returns the raw body.
    #[tracing::instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET bytes from {}...", url);
        let response = self.send(self.client.get(url)).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;

        debug!(
            "Downloaded {:.2} MB",
            bytes.len() as f64 / (1024.0 * 1024.0)
        );
        Ok(bytes.to_vec())
    }

    /// POSTs a multipart form and deserializes the JSON response.
    #[tracing::instrument(skip(self, form))]
    pub async fn post_multipart<T: DeserializeOwned>(&self, url: &str, form: Form) -> Result<T> {
        debug!("POST multipart to {}...", url);
        let response = self.send(self.client.post(url).multipart(form)).await?;
        response
            .json::<T>()
            .await
            .context("Failed to parse JSON response")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        Ok(check_status(response).await?)
    }
}
