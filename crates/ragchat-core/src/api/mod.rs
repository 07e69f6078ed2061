pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::mode::Mode;

pub use http::HttpGateway;
pub use types::{Citation, CorpusStatus, IndexRequest, IndexRunResult, RagAnswer, RetrievedChunk};

/// The remote operations the client depends on.
///
/// Each call is one request/response round trip. Implementations do not
/// retry and do not cache.
#[async_trait]
pub trait RagGateway: Send + Sync {
    /// Ask a question through the endpoint selected by `mode`.
    async fn send_chat(&self, mode: Mode, message: &str) -> Result<RagAnswer, GatewayError>;

    /// Scan and embed a repository. `root_path` is omitted when blank.
    async fn start_index(
        &self,
        repo_name: &str,
        root_path: Option<&str>,
    ) -> Result<IndexRunResult, GatewayError>;

    /// Backfill embeddings for chunks that have none. Returns the service's
    /// plain-text summary.
    async fn start_reindex(&self) -> Result<String, GatewayError>;

    async fn get_status(&self) -> Result<CorpusStatus, GatewayError>;

    /// Top matching chunks for a question, without generating an answer.
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, GatewayError>;
}
