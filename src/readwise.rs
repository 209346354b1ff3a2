//! Readwise Reader client.
//!
//! Durable archive links end up in Readwise Reader through its "save"
//! endpoint. The pipeline only sees the [`ReadLaterSink`] trait, so a run can
//! be exercised without network access.

use crate::errors::ArchiverError;
use crate::models::ReadLaterDocument;
use crate::utils::truncate_for_log;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Readwise Reader "save document" endpoint.
pub const SAVE_ENDPOINT: &str = "https://readwise.io/api/v3/save/";

/// Somewhere documents can be saved for later reading.
pub trait ReadLaterSink {
    /// Save one document and return the service's JSON reply.
    async fn save(&self, doc: &ReadLaterDocument) -> Result<Value, ArchiverError>;
}

/// HTTP client for the Readwise Reader API.
#[derive(Debug, Clone)]
pub struct ReadwiseClient {
    client: reqwest::Client,
    token: String,
    endpoint: String,
}

impl ReadwiseClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, ArchiverError> {
        if token.trim().is_empty() {
            return Err(ArchiverError::MissingToken);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.to_string(),
            endpoint: SAVE_ENDPOINT.to_string(),
        })
    }
}

impl ReadLaterSink for ReadwiseClient {
    #[instrument(level = "info", skip_all, fields(url = %doc.url))]
    async fn save(&self, doc: &ReadLaterDocument) -> Result<Value, ArchiverError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Token {}", self.token))
            .json(doc)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 200 || status == 201 {
            Ok(response.json::<Value>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ArchiverError::ReadLater {
                status,
                body: truncate_for_log(&body, 300),
            })
        }
    }
}

/// Save every URL with the same tags and return the replies of the saves
/// that succeeded. Failures are logged and skipped.
pub async fn save_all<S: ReadLaterSink>(sink: &S, urls: &[String], tags: &[String]) -> Vec<Value> {
    let mut saved = Vec::with_capacity(urls.len());
    for url in urls {
        let doc = ReadLaterDocument::new(url.as_str(), tags);
        info!(%url, "Adding to Readwise");
        match sink.save(&doc).await {
            Ok(reply) => {
                info!(%url, "Added to Readwise");
                saved.push(reply);
            }
            Err(e) => warn!(%url, error = %e, "Failed to add to Readwise"),
        }
    }
    saved
}
