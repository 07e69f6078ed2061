//! Latest corpus status and the latest index/reindex outcomes.

use crate::api::types::{CorpusStatus, IndexRunResult};

/// Holds either the last result or the last error of an operation, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Slot<T> {
    #[default]
    Empty,
    Ready(T),
    Failed(String),
}

impl<T> Slot<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Slot::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Slot::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

impl<T> From<Result<T, String>> for Slot<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => Slot::Ready(value),
            Err(msg) => Slot::Failed(msg),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    status: Option<CorpusStatus>,
    index: Slot<IndexRunResult>,
    reindex: Slot<String>,
}

impl ResultCache {
    pub fn status(&self) -> Option<&CorpusStatus> {
        self.status.as_ref()
    }

    /// Replace the cached status. The snapshot is stored even when its
    /// counters disagree; the returned warning describes the mismatch.
    pub fn store_status(&mut self, status: CorpusStatus) -> Option<String> {
        self.status = Some(status);
        self.status_warning()
    }

    pub fn status_warning(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        if status.is_consistent() {
            return None;
        }
        Some(format!(
            "chunk counts disagree: {} embedded + {} missing != {} total",
            status.chunks_with_embedding, status.chunks_missing_embedding, status.chunks_total
        ))
    }

    pub fn index(&self) -> &Slot<IndexRunResult> {
        &self.index
    }

    pub fn store_index(&mut self, outcome: Result<IndexRunResult, String>) {
        self.index = outcome.into();
    }

    pub fn reindex(&self) -> &Slot<String> {
        &self.reindex
    }

    pub fn store_reindex(&mut self, outcome: Result<String, String>) {
        self.reindex = outcome.into();
    }
}
