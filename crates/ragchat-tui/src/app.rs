use std::future::Future;
use std::sync::Arc;

use ragchat_core::{
    Config, HttpGateway, InputBuffer, Mode, OperationKind, Session, SessionSnapshot,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which text field of the index form has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexField {
    #[default]
    RepoName,
    RootPath,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Index form
    pub index_field: IndexField,
    pub repo_input: InputBuffer,
    pub root_input: InputBuffer,

    // Transcript view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_tail: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub base_url: String,
    pub session: Arc<Session<HttpGateway>>,
    /// Session state as of the last `refresh`; the UI draws only from this.
    pub view: SessionSnapshot,

    events: UnboundedSender<AppEvent>,
    activated: bool,
}

impl App {
    pub fn new(session: Arc<Session<HttpGateway>>, base_url: String, events: UnboundedSender<AppEvent>) -> Self {
        let view = session.snapshot();
        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,

            index_field: IndexField::default(),
            repo_input: InputBuffer::default(),
            root_input: InputBuffer::default(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,

            animation_frame: 0,

            base_url,
            session,
            view,

            events,
            activated: false,
        }
    }

    /// Re-read the session; keeps the transcript pinned to the bottom while
    /// following.
    pub fn refresh(&mut self) {
        let previous_len = self.view.messages.len();
        let was_thinking = self.view.thinking;
        self.view = self.session.snapshot();
        if self.follow_tail
            && (self.view.messages.len() != previous_len || self.view.thinking != was_thinking)
        {
            self.scroll_chat_to_bottom();
        }
    }

    /// Run `op` on the runtime and wake the UI when it settles.
    fn spawn_op<F, Fut>(&self, kind: OperationKind, op: F)
    where
        F: FnOnce(Arc<Session<HttpGateway>>) -> Fut,
        Fut: Future + Send + 'static,
    {
        let task = op(Arc::clone(&self.session));
        let events = self.events.clone();
        tokio::spawn(async move {
            task.await;
            let _ = events.send(AppEvent::Settled(kind));
        });
    }

    /// Initial status load; only the first call does anything.
    pub fn activate(&mut self) {
        if self.activated {
            return;
        }
        self.activated = true;
        self.spawn_op(OperationKind::Status, |s| async move { s.activate().await });
    }

    /// Takes the draft now, so keys pressed before the request goes out
    /// land in a fresh buffer.
    pub fn send_message(&mut self) {
        let ticket = match self.session.send_input() {
            Ok(ticket) => ticket,
            Err(outcome) => {
                debug!(?outcome, "send not accepted");
                return;
            }
        };
        debug!(mode = ticket.mode().as_str(), chars = ticket.text().chars().count(), "send accepted");
        self.follow_tail = true;
        self.refresh();
        self.spawn_op(OperationKind::Send, move |_| ticket.send());
    }

    pub fn start_index(&mut self) {
        if self.session.is_busy(OperationKind::Index) {
            return;
        }
        let repo = self.repo_input.text().to_string();
        let root = self.root_input.text().to_string();
        self.spawn_op(OperationKind::Index, move |s| async move {
            s.run_index(&repo, Some(&root)).await
        });
    }

    pub fn start_reindex(&mut self) {
        if self.session.is_busy(OperationKind::Reindex) {
            return;
        }
        self.spawn_op(OperationKind::Reindex, |s| async move { s.run_reindex().await });
    }

    pub fn refresh_status(&mut self) {
        if self.session.is_busy(OperationKind::Status) {
            return;
        }
        self.spawn_op(OperationKind::Status, |s| async move { s.refresh_status().await });
    }

    pub fn cycle_mode(&mut self) -> Mode {
        let mode = self.session.cycle_mode();
        if let Err(e) = Config::save_default_mode(mode) {
            warn!(error = %e, "could not save default mode");
        }
        mode
    }

    pub fn focused_index_input(&mut self) -> &mut InputBuffer {
        match self.index_field {
            IndexField::RepoName => &mut self.repo_input,
            IndexField::RootPath => &mut self.root_input,
        }
    }

    pub fn toggle_index_field(&mut self) {
        self.index_field = match self.index_field {
            IndexField::RepoName => IndexField::RootPath,
            IndexField::RootPath => IndexField::RepoName,
        };
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.view.thinking {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_chat_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_chat_scroll();
    }

    fn max_chat_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.transcript_lines().saturating_sub(visible_height)
    }

    /// Wrapped line count of the transcript as `ui::render_chat_screen`
    /// lays it out.
    fn transcript_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };
        let wrapped = |text: &str| -> u16 {
            // Use character count, not byte length, for proper UTF-8 handling
            let char_count = text.chars().count();
            if char_count == 0 {
                1
            } else {
                char_count.div_ceil(wrap_width) as u16
            }
        };

        let mut total_lines: u16 = 0;
        for msg in &self.view.messages {
            total_lines = total_lines.saturating_add(1); // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                total_lines = total_lines.saturating_add(wrapped(line));
            }
            if !msg.citations.is_empty() {
                total_lines = total_lines.saturating_add(1); // "Sources:" header
                for citation in &msg.citations {
                    total_lines = total_lines.saturating_add(wrapped(&citation.location()));
                    if citation.snippet.lines().next().is_some_and(|l| !l.trim().is_empty()) {
                        total_lines = total_lines.saturating_add(1); // first snippet line, clipped
                    }
                }
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.view.thinking {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }
        total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{ChatMessage, Citation, RagAnswer};
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(HttpGateway::new("http://127.0.0.1:9")));
        let mut app = App::new(session, "http://127.0.0.1:9".to_string(), tx);
        app.chat_width = 10;
        app.chat_height = 4;
        app
    }

    #[test]
    fn test_transcript_lines_count_wrapping_and_citations() {
        let mut app = app();
        app.view.messages = vec![
            ChatMessage::user("0123456789abc"), // 1 role + 2 wrapped + 1 blank
            ChatMessage::answer(RagAnswer {
                answer: "ok".to_string(), // 1 role + 1 + blank
                citations: vec![Citation {
                    file_path: "a.rs".to_string(),
                    start_line: 1,
                    end_line: 2,
                    snippet: "fn main() {}".to_string(),
                }],
            }),
        ];
        // second message: role + content + "Sources:" + location + snippet + blank
        assert_eq!(app.transcript_lines(), 4 + 6);

        app.view.thinking = true;
        assert_eq!(app.transcript_lines(), 12);
    }

    #[test]
    fn test_scrolling_stops_following_until_bottom() {
        let mut app = app();
        app.view.messages = (0..5).map(|i| ChatMessage::user(&i.to_string())).collect();
        // 5 messages * 3 lines = 15 lines, 4 visible
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, 11);

        app.scroll_up(3);
        assert!(!app.follow_tail);
        assert_eq!(app.chat_scroll, 8);

        app.scroll_down(100);
        assert!(app.follow_tail);
        assert_eq!(app.chat_scroll, 11);
    }

    #[tokio::test]
    async fn test_send_message_takes_draft_immediately() {
        let mut app = app();
        app.session.edit_input(|input| input.set("where is main?"));
        app.send_message();

        assert_eq!(app.view.messages.len(), 1);
        assert_eq!(app.view.messages[0].content, "where is main?");
        assert!(app.view.thinking);
        assert_eq!(app.view.input.text(), "");

        // Typing before the request goes out starts a new draft
        app.session.edit_input(|input| input.insert('x'));
        assert_eq!(app.session.messages()[0].content, "where is main?");
        assert_eq!(app.session.edit_input(|input| input.text().to_string()), "x");

        // A second Enter while sending is ignored
        app.send_message();
        assert_eq!(app.session.message_count(), 1);
    }

    #[test]
    fn test_index_field_toggle() {
        let mut app = app();
        app.focused_index_input().set("docs");
        app.toggle_index_field();
        app.focused_index_input().set("/srv/docs");
        assert_eq!(app.repo_input.text(), "docs");
        assert_eq!(app.root_input.text(), "/srv/docs");
    }
}
