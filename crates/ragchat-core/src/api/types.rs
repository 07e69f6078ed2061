//! Request and response bodies of the answering/indexing service.

use serde::{Deserialize, Serialize};

/// A pointer into a source file backing part of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub snippet: String,
}

impl Citation {
    /// `path:start-end`, or `path:line` for single-line citations.
    pub fn location(&self) -> String {
        if self.start_line == self.end_line {
            format!("{}:{}", self.file_path, self.start_line)
        } else {
            format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RetrieveRequest<'a> {
    pub question: &'a str,
}

/// Body of `POST /api/index`. A blank root path is left out entirely so the
/// server falls back to its configured repository roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRequest {
    pub repo_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
}

impl IndexRequest {
    pub fn new(repo_name: &str, root_path: Option<&str>) -> Self {
        Self {
            repo_name: repo_name.trim().to_string(),
            root_path: root_path
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

/// Outcome of one indexing invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRunResult {
    #[serde(default)]
    pub repository_id: i64,
    pub files_scanned: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub documents_upserted: u64,
    pub chunks_created: u64,
    pub chunks_embedded: u64,
    pub elapsed_ms_total: u64,
    #[serde(default)]
    pub embedding_error: Option<String>,
}

/// Corpus-wide counters reported by `GET /api/index/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStatus {
    pub repository_count: u64,
    pub document_count: u64,
    pub chunks_total: u64,
    pub chunks_with_embedding: u64,
    pub chunks_missing_embedding: u64,
}

impl CorpusStatus {
    /// Whether embedded + missing adds up to the total.
    pub fn is_consistent(&self) -> bool {
        self.chunks_with_embedding
            .checked_add(self.chunks_missing_embedding)
            .is_some_and(|sum| sum == self.chunks_total)
    }

    /// Fraction of chunks that carry an embedding, in `0.0..=1.0`.
    /// An empty corpus has nothing left to embed and counts as fully covered.
    pub fn embedding_coverage(&self) -> f64 {
        if self.chunks_total == 0 {
            return 1.0;
        }
        (self.chunks_with_embedding as f64 / self.chunks_total as f64).clamp(0.0, 1.0)
    }
}

/// One chunk returned by `POST /api/retrieve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    #[serde(default)]
    pub id: Option<i64>,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_request_omits_blank_root() {
        let body = serde_json::to_value(IndexRequest::new("docs", None)).unwrap();
        assert_eq!(body, json!({"repoName": "docs"}));

        let body = serde_json::to_value(IndexRequest::new("docs", Some("   "))).unwrap();
        assert_eq!(body, json!({"repoName": "docs"}));
    }

    #[test]
    fn test_index_request_keeps_root() {
        let body = serde_json::to_value(IndexRequest::new(" api ", Some(" /srv/api "))).unwrap();
        assert_eq!(body, json!({"repoName": "api", "rootPath": "/srv/api"}));
    }

    #[test]
    fn test_answer_without_citations() {
        let answer: RagAnswer = serde_json::from_str(r#"{"answer":"hi"}"#).unwrap();
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn test_index_result_from_server_body() {
        let body = json!({
            "repositoryId": 3,
            "filesScanned": 120,
            "filesIndexed": 100,
            "filesSkipped": 20,
            "documentsUpserted": 100,
            "chunksCreated": 850,
            "chunksEmbedded": 850,
            "elapsedMsTotal": 4200,
            "embeddingError": null
        });
        let result: IndexRunResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.repository_id, 3);
        assert_eq!(result.chunks_created, 850);
        assert_eq!(result.embedding_error, None);
    }

    #[test]
    fn test_status_consistency() {
        let mut status = CorpusStatus {
            repository_count: 1,
            document_count: 10,
            chunks_total: 100,
            chunks_with_embedding: 60,
            chunks_missing_embedding: 40,
        };
        assert!(status.is_consistent());
        assert!((status.embedding_coverage() - 0.6).abs() < 1e-9);

        status.chunks_missing_embedding = 10;
        assert!(!status.is_consistent());
    }

    #[test]
    fn test_empty_corpus_coverage() {
        assert_eq!(CorpusStatus::default().embedding_coverage(), 1.0);
    }

    #[test]
    fn test_citation_location() {
        let mut c = Citation {
            file_path: "auth.ts".into(),
            start_line: 10,
            end_line: 20,
            snippet: String::new(),
        };
        assert_eq!(c.location(), "auth.ts:10-20");
        c.end_line = 10;
        assert_eq!(c.location(), "auth.ts:10");
    }
}
