//! Scripted in-memory gateway shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};

use ragchat_core::{
    CorpusStatus, GatewayError, IndexRunResult, Mode, RagAnswer, RagGateway, RetrievedChunk,
};

type Reply<T> = oneshot::Receiver<Result<T, GatewayError>>;
pub type Hold<T> = oneshot::Sender<Result<T, GatewayError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Chat(Mode, String),
    Index(String, Option<String>),
    Reindex,
    Status,
    Retrieve(String),
}

/// Records every call and answers from per-operation queues. An empty queue
/// answers with a default success; a held reply stays pending until the
/// test sends on the matching [`Hold`].
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    chat: Mutex<VecDeque<Reply<RagAnswer>>>,
    index: Mutex<VecDeque<Reply<IndexRunResult>>>,
    reindex: Mutex<VecDeque<Reply<String>>>,
    status: Mutex<VecDeque<Reply<CorpusStatus>>>,
    /// Signalled whenever a call enters the gateway.
    pub entered: Notify,
}

fn ready<T>(queue: &Mutex<VecDeque<Reply<T>>>, value: Result<T, GatewayError>) {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(value);
    queue.lock().unwrap().push_back(rx);
}

fn held<T>(queue: &Mutex<VecDeque<Reply<T>>>) -> Hold<T> {
    let (tx, rx) = oneshot::channel();
    queue.lock().unwrap().push_back(rx);
    tx
}

async fn next<T>(queue: &Mutex<VecDeque<Reply<T>>>, default: impl FnOnce() -> T) -> Result<T, GatewayError> {
    let reply = queue.lock().unwrap().pop_front();
    match reply {
        Some(rx) => rx
            .await
            .unwrap_or_else(|_| Err(GatewayError::Transport("reply dropped".to_string()))),
        None => Ok(default()),
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    pub fn status_calls(&self) -> usize {
        self.count(|c| *c == Call::Status)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        self.entered.notify_one();
    }

    pub fn reply_chat(&self, value: Result<RagAnswer, GatewayError>) {
        ready(&self.chat, value);
    }

    pub fn hold_chat(&self) -> Hold<RagAnswer> {
        held(&self.chat)
    }

    pub fn reply_index(&self, value: Result<IndexRunResult, GatewayError>) {
        ready(&self.index, value);
    }

    pub fn hold_index(&self) -> Hold<IndexRunResult> {
        held(&self.index)
    }

    pub fn reply_reindex(&self, value: Result<String, GatewayError>) {
        ready(&self.reindex, value);
    }

    pub fn reply_status(&self, value: Result<CorpusStatus, GatewayError>) {
        ready(&self.status, value);
    }

    pub fn hold_status(&self) -> Hold<CorpusStatus> {
        held(&self.status)
    }
}

#[async_trait]
impl RagGateway for FakeGateway {
    async fn send_chat(&self, mode: Mode, message: &str) -> Result<RagAnswer, GatewayError> {
        self.record(Call::Chat(mode, message.to_string()));
        let message = message.to_string();
        next(&self.chat, move || RagAnswer {
            answer: format!("answer to {}", message),
            citations: Vec::new(),
        })
        .await
    }

    async fn start_index(
        &self,
        repo_name: &str,
        root_path: Option<&str>,
    ) -> Result<IndexRunResult, GatewayError> {
        self.record(Call::Index(repo_name.to_string(), root_path.map(str::to_string)));
        next(&self.index, IndexRunResult::default).await
    }

    async fn start_reindex(&self) -> Result<String, GatewayError> {
        self.record(Call::Reindex);
        next(&self.reindex, || "Re-indexed 0 chunks".to_string()).await
    }

    async fn get_status(&self) -> Result<CorpusStatus, GatewayError> {
        self.record(Call::Status);
        next(&self.status, CorpusStatus::default).await
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, GatewayError> {
        self.record(Call::Retrieve(question.to_string()));
        Ok(Vec::new())
    }
}

pub fn status(total: u64, with_embedding: u64) -> CorpusStatus {
    CorpusStatus {
        repository_count: 1,
        document_count: 12,
        chunks_total: total,
        chunks_with_embedding: with_embedding,
        chunks_missing_embedding: total - with_embedding,
    }
}

pub fn service_error(status: u16, body: &str) -> GatewayError {
    GatewayError::Service {
        status,
        body: body.to_string(),
    }
}
