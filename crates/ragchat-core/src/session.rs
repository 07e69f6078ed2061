//! Session-scoped orchestration of user-triggered operations.
//!
//! Every operation runs in three steps: a synchronous begin (validate, take
//! the guard, apply optimistic changes), exactly one gateway call, and a
//! synchronous finish (merge the result, release the guard). The state lock
//! is only held inside the synchronous steps and never across an `.await`,
//! so any number of operations can be in flight on one event loop while each
//! state change stays atomic with respect to the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::api::types::{CorpusStatus, IndexRunResult, RetrievedChunk};
use crate::api::RagGateway;
use crate::cache::{ResultCache, Slot};
use crate::conversation::{ConversationStore, InputBuffer};
use crate::error::GatewayError;
use crate::guard::{Guards, OperationKind};
use crate::mode::Mode;
use crate::state::ChatMessage;

/// How a requested operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded and its result was stored.
    Completed,
    /// A validation or gateway error was stored in place of a result.
    Failed,
    /// Nothing happened: no state change and no network call.
    Ignored(Skip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    EmptyInput,
    Busy,
    AlreadyActive,
}

struct SessionState {
    mode: Mode,
    conversation: ConversationStore,
    cache: ResultCache,
    guards: Guards,
    /// Set when the corpus changed during an in-flight status refresh.
    status_refresh_pending: bool,
}

/// Copy of everything a front end needs to draw one frame.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub messages: Vec<ChatMessage>,
    pub input: InputBuffer,
    /// Derived from the send guard; never part of `messages`.
    pub thinking: bool,
    pub can_send: bool,
    pub status: Option<CorpusStatus>,
    pub status_warning: Option<String>,
    pub index: Slot<IndexRunResult>,
    pub reindex: Slot<String>,
    pub guards: Guards,
}

pub struct Session<G> {
    gateway: G,
    state: Mutex<SessionState>,
    activated: AtomicBool,
}

/// Guard ownership for one in-flight call. Releases the guard when dropped,
/// so an abandoned future cannot leave the operation marked busy.
struct Lease<'a, G> {
    session: &'a Session<G>,
    kind: OperationKind,
    armed: bool,
}

impl<G> Lease<'_, G> {
    /// Hand guard ownership to a [`SendTicket`].
    fn disarm(mut self) {
        self.armed = false;
    }

    /// Apply the result and release the guard under one lock.
    fn finish<R>(mut self, error: Option<String>, apply: impl FnOnce(&mut SessionState) -> R) -> R {
        self.armed = false;
        let mut state = self.session.lock();
        let out = apply(&mut state);
        state.guards.get_mut(self.kind).settle(error);
        out
    }
}

impl<G> Drop for Lease<'_, G> {
    fn drop(&mut self) {
        if self.armed {
            warn!(operation = %self.kind, "operation abandoned before completing");
            self.session
                .lock()
                .guards
                .get_mut(self.kind)
                .settle(Some("operation was interrupted".to_string()));
        }
    }
}

/// A send that has already been accepted: the user message is in the
/// transcript and the send guard is taken. Dropping it unsent releases the
/// guard.
#[must_use = "dropping the ticket abandons the send"]
pub struct SendTicket<G> {
    session: Arc<Session<G>>,
    mode: Mode,
    text: String,
    armed: bool,
}

impl<G: RagGateway> SendTicket<G> {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Issue the request and merge the answer into the transcript.
    pub async fn send(mut self) -> Outcome {
        self.armed = false;
        let session = Arc::clone(&self.session);
        let mode = self.mode;
        let text = std::mem::take(&mut self.text);
        drop(self);

        let lease = Lease {
            session: &*session,
            kind: OperationKind::Send,
            armed: true,
        };
        session.complete_send(lease, mode, &text).await
    }
}

impl<G> Drop for SendTicket<G> {
    fn drop(&mut self) {
        if self.armed {
            warn!("send abandoned before the request went out");
            self.session
                .lock()
                .guards
                .get_mut(OperationKind::Send)
                .settle(Some("operation was interrupted".to_string()));
        }
    }
}

impl<G> Session<G> {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the guard for `kind` unless it is busy or `prepare` rejects.
    /// `prepare` runs under the same lock as the acquire.
    fn begin<T>(
        &self,
        kind: OperationKind,
        prepare: impl FnOnce(&mut SessionState) -> Result<T, Outcome>,
    ) -> Result<(Lease<'_, G>, T), Outcome> {
        let mut state = self.lock();
        if state.guards.is_busy(kind) {
            debug!(operation = %kind, "already in flight; ignoring request");
            return Err(Outcome::Ignored(Skip::Busy));
        }
        let value = prepare(&mut state)?;
        state.guards.get_mut(kind).try_acquire();
        Ok((
            Lease {
                session: self,
                kind,
                armed: true,
            },
            value,
        ))
    }
}

impl<G: RagGateway> Session<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_mode(gateway, Mode::default())
    }

    pub fn with_mode(gateway: G, mode: Mode) -> Self {
        Self {
            gateway,
            state: Mutex::new(SessionState {
                mode,
                conversation: ConversationStore::default(),
                cache: ResultCache::default(),
                guards: Guards::default(),
                status_refresh_pending: false,
            }),
            activated: AtomicBool::new(false),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // Mode

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    /// Only affects sends issued after this call.
    pub fn set_mode(&self, mode: Mode) {
        let mut state = self.lock();
        if state.mode != mode {
            info!(from = state.mode.as_str(), to = mode.as_str(), "mode changed");
            state.mode = mode;
        }
    }

    pub fn cycle_mode(&self) -> Mode {
        let next = self.mode().next();
        self.set_mode(next);
        next
    }

    // Conversation

    /// Send `text` through the active mode's endpoint.
    ///
    /// Blank text or a busy send guard makes this a no-op. Otherwise the user
    /// message is appended and the input buffer cleared before the request is
    /// issued; the answer (or an `Error:` entry) is appended when it settles.
    pub async fn submit(&self, text: &str) -> Outcome {
        match self.begin_send(Some(text)) {
            Ok((lease, mode, text)) => self.complete_send(lease, mode, &text).await,
            Err(outcome) => outcome,
        }
    }

    /// [`Session::submit`] with the contents of the input buffer at the time
    /// this future first runs.
    pub async fn submit_input(&self) -> Outcome {
        match self.begin_send(None) {
            Ok((lease, mode, text)) => self.complete_send(lease, mode, &text).await,
            Err(outcome) => outcome,
        }
    }

    /// Start sending the input buffer now. The user message is appended, the
    /// buffer cleared and the send guard taken before this returns; the
    /// ticket issues the request.
    pub fn send_input(self: &Arc<Self>) -> Result<SendTicket<G>, Outcome> {
        let (lease, mode, text) = self.begin_send(None)?;
        lease.disarm();
        Ok(SendTicket {
            session: Arc::clone(self),
            mode,
            text,
            armed: true,
        })
    }

    /// `None` takes the text from the input buffer under the same lock.
    fn begin_send(&self, text: Option<&str>) -> Result<(Lease<'_, G>, Mode, String), Outcome> {
        let (lease, (mode, text)) = self.begin(OperationKind::Send, |state| {
            let text = match text {
                Some(text) => text.trim().to_string(),
                None => state.conversation.input().text().trim().to_string(),
            };
            if text.is_empty() {
                return Err(Outcome::Ignored(Skip::EmptyInput));
            }
            state.conversation.append(ChatMessage::user(&text));
            state.conversation.input_mut().clear();
            Ok((state.mode, text))
        })?;
        Ok((lease, mode, text))
    }

    async fn complete_send<'a>(&'a self, lease: Lease<'a, G>, mode: Mode, text: &str) -> Outcome {
        info!(mode = mode.as_str(), endpoint = mode.endpoint(), "sending message");
        match self.gateway.send_chat(mode, text).await {
            Ok(answer) => {
                debug!(citations = answer.citations.len(), "answer received");
                lease.finish(None, |state| {
                    state.conversation.append(ChatMessage::answer(answer));
                    Outcome::Completed
                })
            }
            Err(err) => {
                warn!(mode = mode.as_str(), error = %err, "chat request failed");
                let message = err.user_message();
                lease.finish(Some(message.clone()), |state| {
                    state.conversation.append(ChatMessage::error(&message));
                    Outcome::Failed
                })
            }
        }
    }

    pub fn edit_input<R>(&self, edit: impl FnOnce(&mut InputBuffer) -> R) -> R {
        edit(self.lock().conversation.input_mut())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().conversation.messages().to_vec()
    }

    pub fn message_count(&self) -> usize {
        self.lock().conversation.len()
    }

    pub fn is_thinking(&self) -> bool {
        self.is_busy(OperationKind::Send)
    }

    pub fn can_send(&self) -> bool {
        let state = self.lock();
        state.conversation.can_send(state.guards.is_busy(OperationKind::Send))
    }

    // Corpus status and indexing

    /// Fetch the corpus status. A failure keeps whatever was cached before.
    ///
    /// When the corpus changes while the fetch is in flight, the guard stays
    /// taken and the status is fetched again before this settles.
    pub async fn refresh_status(&self) -> Outcome {
        let (mut lease, ()) = match self.begin(OperationKind::Status, |state| {
            state.status_refresh_pending = false;
            Ok(())
        }) {
            Ok(begun) => begun,
            Err(outcome) => return outcome,
        };

        loop {
            let fetched = self.gateway.get_status().await;
            let settled = {
                let mut state = self.lock();
                let (outcome, error) = match fetched {
                    Ok(status) => {
                        if let Some(warning) = state.cache.store_status(status) {
                            warn!(%warning, "corpus status failed integrity check");
                        }
                        debug!(
                            repositories = status.repository_count,
                            chunks_total = status.chunks_total,
                            "corpus status refreshed"
                        );
                        (Outcome::Completed, None)
                    }
                    Err(err) => {
                        warn!(error = %err, "status refresh failed; keeping previous snapshot");
                        (Outcome::Failed, Some(err.user_message()))
                    }
                };
                if std::mem::take(&mut state.status_refresh_pending) {
                    debug!("corpus changed during status refresh; fetching again");
                    None
                } else {
                    state.guards.get_mut(OperationKind::Status).settle(error);
                    lease.armed = false;
                    Some(outcome)
                }
            };
            if let Some(outcome) = settled {
                return outcome;
            }
        }
    }

    /// Refresh owed after the corpus changed. If a refresh is already in
    /// flight, it is asked to fetch once more instead.
    async fn refresh_after_change(&self) {
        loop {
            if self.refresh_status().await != Outcome::Ignored(Skip::Busy) {
                return;
            }
            let deferred = {
                let mut state = self.lock();
                let busy = state.guards.is_busy(OperationKind::Status);
                if busy {
                    state.status_refresh_pending = true;
                }
                busy
            };
            if deferred {
                debug!("status refresh in flight; queued a follow-up fetch");
                return;
            }
        }
    }

    /// Index a repository, then refresh the status once on success.
    pub async fn run_index(&self, repo_name: &str, root_path: Option<&str>) -> Outcome {
        let repo = repo_name.trim();
        let (lease, ()) = match self.begin(OperationKind::Index, |state| {
            if repo.is_empty() {
                let message = GatewayError::validation("repository name is required").user_message();
                warn!("index run rejected: {}", message);
                state.cache.store_index(Err(message.clone()));
                state.guards.get_mut(OperationKind::Index).settle(Some(message));
                return Err(Outcome::Failed);
            }
            Ok(())
        }) {
            Ok(begun) => begun,
            Err(outcome) => return outcome,
        };

        info!(repo, root = ?root_path, "index run started");
        match self.gateway.start_index(repo, root_path).await {
            Ok(result) => {
                info!(
                    repo,
                    files_indexed = result.files_indexed,
                    chunks_created = result.chunks_created,
                    chunks_embedded = result.chunks_embedded,
                    elapsed_ms = result.elapsed_ms_total,
                    "index run finished"
                );
                if let Some(embedding_error) = &result.embedding_error {
                    warn!(repo, error = %embedding_error, "index run reported embedding errors");
                }
                lease.finish(None, |state| state.cache.store_index(Ok(result)));
                self.refresh_after_change().await;
                Outcome::Completed
            }
            Err(err) => {
                warn!(repo, error = %err, "index run failed");
                let message = err.user_message();
                lease.finish(Some(message.clone()), |state| {
                    state.cache.store_index(Err(message))
                });
                Outcome::Failed
            }
        }
    }

    /// Backfill missing embeddings, then refresh the status once on success.
    pub async fn run_reindex(&self) -> Outcome {
        let (lease, ()) = match self.begin(OperationKind::Reindex, |_| Ok(())) {
            Ok(begun) => begun,
            Err(outcome) => return outcome,
        };

        info!("embedding backfill started");
        match self.gateway.start_reindex().await {
            Ok(summary) => {
                info!(%summary, "embedding backfill finished");
                lease.finish(None, |state| state.cache.store_reindex(Ok(summary)));
                self.refresh_after_change().await;
                Outcome::Completed
            }
            Err(err) => {
                warn!(error = %err, "embedding backfill failed");
                let message = err.user_message();
                lease.finish(Some(message.clone()), |state| {
                    state.cache.store_reindex(Err(message))
                });
                Outcome::Failed
            }
        }
    }

    /// Initial load. Only the first call refreshes the status.
    pub async fn activate(&self) -> Outcome {
        if self.activated.swap(true, Ordering::SeqCst) {
            return Outcome::Ignored(Skip::AlreadyActive);
        }
        info!("session activated; loading corpus status");
        self.refresh_status().await
    }

    /// Top matching chunks for `question`. Not guarded and not cached.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, GatewayError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GatewayError::validation("question is required"));
        }
        self.gateway.retrieve(question).await
    }

    pub fn status(&self) -> Option<CorpusStatus> {
        self.lock().cache.status().copied()
    }

    /// Integrity warning for the cached status, if its counts disagree.
    pub fn status_warning(&self) -> Option<String> {
        self.lock().cache.status_warning()
    }

    pub fn index_result(&self) -> Slot<IndexRunResult> {
        self.lock().cache.index().clone()
    }

    pub fn reindex_result(&self) -> Slot<String> {
        self.lock().cache.reindex().clone()
    }

    // Guards

    pub fn is_busy(&self, kind: OperationKind) -> bool {
        self.lock().guards.is_busy(kind)
    }

    pub fn last_error(&self, kind: OperationKind) -> Option<String> {
        self.lock().guards.get(kind).last_error().map(str::to_string)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        let send_busy = state.guards.is_busy(OperationKind::Send);
        SessionSnapshot {
            mode: state.mode,
            messages: state.conversation.messages().to_vec(),
            input: state.conversation.input().clone(),
            thinking: send_busy,
            can_send: state.conversation.can_send(send_busy),
            status: state.cache.status().copied(),
            status_warning: state.cache.status_warning(),
            index: state.cache.index().clone(),
            reindex: state.cache.reindex().clone(),
            guards: state.guards.clone(),
        }
    }
}
