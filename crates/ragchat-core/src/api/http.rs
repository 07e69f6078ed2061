use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    ChatRequest, CorpusStatus, IndexRequest, IndexRunResult, RagAnswer, RetrieveRequest,
    RetrievedChunk,
};
use super::RagGateway;
use crate::error::GatewayError;
use crate::mode::Mode;

const INDEX_PATH: &str = "/api/index";
const STATUS_PATH: &str = "/api/index/status";
const REINDEX_PATH: &str = "/api/reindex";
const RETRIEVE_PATH: &str = "/api/retrieve";

/// [`RagGateway`] over HTTP/JSON.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `GatewayError::Service` carrying the body text.
    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Service {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let response = Self::check(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RagGateway for HttpGateway {
    async fn send_chat(&self, mode: Mode, message: &str) -> Result<RagAnswer, GatewayError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(GatewayError::validation("message is required"));
        }

        let url = self.url(mode.endpoint());
        debug!(mode = mode.as_str(), %url, "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn start_index(
        &self,
        repo_name: &str,
        root_path: Option<&str>,
    ) -> Result<IndexRunResult, GatewayError> {
        let request = IndexRequest::new(repo_name, root_path);
        if request.repo_name.is_empty() {
            return Err(GatewayError::validation("repository name is required"));
        }

        let url = self.url(INDEX_PATH);
        debug!(repo = %request.repo_name, root = ?request.root_path, "starting index run");

        let response = self.client.post(&url).json(&request).send().await?;
        Self::read_json(response).await
    }

    async fn start_reindex(&self) -> Result<String, GatewayError> {
        let url = self.url(REINDEX_PATH);
        debug!(%url, "starting embedding backfill");

        let response = self.client.post(&url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.text().await?)
    }

    async fn get_status(&self) -> Result<CorpusStatus, GatewayError> {
        let response = self.client.get(self.url(STATUS_PATH)).send().await?;
        Self::read_json(response).await
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, GatewayError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GatewayError::validation("question is required"));
        }

        let response = self
            .client
            .post(self.url(RETRIEVE_PATH))
            .json(&RetrieveRequest { question })
            .send()
            .await?;

        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let gateway = HttpGateway::new("http://localhost:8080/");
        assert_eq!(gateway.base_url(), "http://localhost:8080");
        assert_eq!(gateway.url(STATUS_PATH), "http://localhost:8080/api/index/status");
    }

    #[tokio::test]
    async fn test_blank_inputs_rejected_before_sending() {
        // Port 9 (discard) is never contacted: validation fails first.
        let gateway = HttpGateway::new("http://127.0.0.1:9");

        let err = gateway.send_chat(Mode::Chat, "   ").await.unwrap_err();
        assert!(err.is_validation());

        let err = gateway.start_index("  ", Some("/srv")).await.unwrap_err();
        assert!(err.is_validation());

        let err = gateway.retrieve("").await.unwrap_err();
        assert!(err.is_validation());
    }
}
