//! HTTP client for the Scribe API.
//!
//! This client abstracts whether the MCP server talks to a local or remote
//! engine. Configuration is via environment variables:
//! - `SCRIBE_URL` - Base URL (default: `http://localhost:17015/api/v1`)
//! - `SCRIBE_API_KEY` - API key for authentication (optional for local)

use std::path::Path;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::doc::SectionedDocument;
use crate::models::*;

/// Default URL for local development.
const DEFAULT_URL: &str = "http://localhost:17015/api/v1";

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),
}

/// HTTP client for the Scribe API.
#[derive(Debug, Clone)]
pub struct ScribeClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ScribeClient {
    /// Create client from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("SCRIBE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var("SCRIBE_API_KEY").ok();
        Self::new(base_url, api_key)
    }

    /// Create with explicit configuration.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: Client::new(),
        }
    }

    /// Build a request with optional auth header.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::status_error(status, response.text().await.unwrap_or_default()))
        }
    }

    /// Handle response that may return empty body (204 No Content).
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::status_error(status, response.text().await.unwrap_or_default()))
        }
    }

    fn status_error(status: StatusCode, body: String) -> ClientError {
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::BadRequest(body)
            }
            StatusCode::CONFLICT => ClientError::Conflict(body),
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            _ => ClientError::Server(format!("{}: {}", status, body)),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Session Operations
    // ============================================================

    pub async fn start_session(
        &self,
        input: &StartSessionInput,
    ) -> Result<DocumentationSession, ClientError> {
        self.post_json("/sessions", input).await
    }

    pub async fn get_session(&self, id: Uuid) -> Result<DocumentationSession, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/sessions/{}", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn end_session(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/sessions/{}", id))
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    pub async fn select_branch(
        &self,
        id: Uuid,
        input: &SelectBranchInput,
    ) -> Result<BranchSelection, ClientError> {
        self.post_json(&format!("/sessions/{}/branch", id), input).await
    }

    // ============================================================
    // Document Operations
    // ============================================================

    pub async fn write_document(
        &self,
        id: Uuid,
        input: &WriteDocumentInput,
    ) -> Result<WriteOutcome, ClientError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/sessions/{}/document", id))
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn read_document(
        &self,
        id: Uuid,
        path: &Path,
    ) -> Result<SectionedDocument, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/sessions/{}/document", id))
            .query(&[("path", path.display().to_string())])
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn analyze_impact(
        &self,
        id: Uuid,
        input: &AnalyzeImpactInput,
    ) -> Result<ImpactReport, ClientError> {
        self.post_json(&format!("/sessions/{}/impact", id), input).await
    }

    pub async fn update_sections(
        &self,
        id: Uuid,
        input: &UpdateSectionsInput,
    ) -> Result<WriteOutcome, ClientError> {
        self.post_json(&format!("/sessions/{}/sections", id), input).await
    }

    pub async fn open_review(
        &self,
        id: Uuid,
        input: &OpenReviewInput,
    ) -> Result<ReviewHandle, ClientError> {
        self.post_json(&format!("/sessions/{}/review", id), input).await
    }
}
