//! API client for the chat server's REST endpoints.
//!
//! This module provides the [`ApiClient`] struct which handles attachment
//! uploads and history paging. Both are plain request/response calls; the
//! streaming conversation itself goes through [`crate::stream`].

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::detail::extract_error_message;
use super::types::{mime_info, AttachmentSource, MessagePage, UploadResponse};
use crate::config::Config;
use crate::constants::{self, API_PREFIX, MESSAGES_PATH, UPLOAD_PATH};

/// API client for the chat server.
///
/// Failures carry the server's own explanation when it gives one (see
/// [`extract_error_message`]).
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a new API client for `base_url` (scheme + host, no path).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    /// Creates an API client from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .filter(|url| !url.is_empty())
            .context("server base URL is not configured (set CHAT_STREAM_BASE_URL)")?;
        Self::new(base_url)
    }

    /// Creates an API client with a pre-configured HTTP client.
    ///
    /// Useful for testing or when custom client configuration is needed.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    /// Uploads one attachment and returns the id the server assigned.
    ///
    /// Files on disk are sent with a content type inferred from their
    /// extension; in-memory sources may declare their own.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the failure reason if the file cannot be
    /// read, the request fails, or the server rejects the upload.
    pub async fn upload_attachment(
        &self,
        token: Option<&str>,
        source: &AttachmentSource,
    ) -> Result<String> {
        let part = build_part(source).await?;
        let form = Form::new().part("file", part);

        let request = authorize(self.client.post(self.url(UPLOAD_PATH)), token).multipart(form);
        let response = match send(request).await {
            Ok(response) => response,
            Err(reason) => {
                log::error!("[server] Upload error: {reason}");
                anyhow::bail!(reason);
            }
        };

        let upload: UploadResponse = response
            .json()
            .await
            .context("Upload succeeded but the response had no attachment_id")?;
        log::debug!("[server] Uploaded attachment {}", upload.attachment_id);
        Ok(upload.attachment_id)
    }

    /// Fetches a page of history older than `before` (newest page if `None`).
    ///
    /// An empty page means there is no older history.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the failure reason if the request fails or
    /// the server rejects it.
    pub async fn recent_messages(
        &self,
        token: Option<&str>,
        before: Option<&str>,
        limit: u32,
    ) -> Result<MessagePage> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(2);
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        query.push(("limit", limit.to_string()));

        let request = authorize(self.client.get(self.url(MESSAGES_PATH)), token).query(&query);
        let response = match send(request).await {
            Ok(response) => response,
            Err(reason) => {
                log::error!("[server] Error getting chat: {reason}");
                anyhow::bail!(reason);
            }
        };

        response
            .json()
            .await
            .context("Failed to parse history page")
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Send a request, turning transport errors and non-2xx answers into a
/// failure reason.
async fn send(request: RequestBuilder) -> std::result::Result<Response, String> {
    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = format!("Request failed with status code {}", status.as_u16());
    let body = response.json::<Value>().await.ok();
    Err(extract_error_message(body.as_ref(), &fallback))
}

async fn build_part(source: &AttachmentSource) -> Result<Part> {
    match source {
        AttachmentSource::Memory {
            bytes,
            file_name,
            mime_type,
        } => {
            let mime = mime_type
                .clone()
                .unwrap_or_else(|| mime_info(file_name).mime_type.to_string());
            Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str(&mime)
                .with_context(|| format!("invalid content type {mime}"))
        }
        AttachmentSource::Path { path, file_name } => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Invalid asset: cannot read {}", path.display()))?;
            let uri = path.to_string_lossy();
            let info = mime_info(&uri);
            let file_name = file_name
                .clone()
                .or_else(|| {
                    uri.rsplit('/')
                        .next()
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| {
                    let suffix = uuid::Uuid::new_v4().simple().to_string();
                    format!("file{}.{}", &suffix[..4], info.extension)
                });
            Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(info.mime_type)
                .context("invalid content type")
        }
    }
}
