use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use super::{ChatBackend, ChunkStream, ClientError};
use crate::config::Settings;
use crate::protocol::{ChatRequest, GenerateRequest, GenerateResponse, ModelInfo, ModelList};
use crate::stream::decode_utf8;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, auth_header: Option<&str>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = auth_header {
            let value = HeaderValue::from_str(auth).map_err(|_| ClientError::InvalidAuthHeader)?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        Self::new(settings.api_base_url(), settings.auth_header.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
        Err(ClientError::Status { status: status.as_u16(), body })
    }

    /// Models installed on the server (`GET /api/tags`)
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let resp = self.http.get(self.url("/api/tags")).send().await?;
        let list: ModelList = Self::check_status(resp).await?.json().await?;
        Ok(list.models)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChunkStream, ClientError> {
        debug!(model = %request.model, messages = request.messages.len(), "starting chat stream");
        let resp = self.http.post(self.url("/api/chat")).json(&request).send().await?;
        let resp = Self::check_status(resp).await?;

        let bytes = Box::pin(resp.bytes_stream());
        Ok(decode_utf8(bytes).map(|chunk| chunk.map_err(ClientError::from)).boxed())
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, ClientError> {
        let request = GenerateRequest { stream: false, ..request };
        let resp = self.http.post(self.url("/api/generate")).json(&request).send().await?;
        let body: GenerateResponse = Self::check_status(resp).await?.json().await?;
        Ok(body.response)
    }
}
