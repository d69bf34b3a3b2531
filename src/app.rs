use std::path::PathBuf;

use ratatui::layout::Rect;
use ratatui::text::Line;
use tokio::task::JoinHandle;

use crate::api::{ApiResult, RagClient};
use crate::config::Config;
use crate::explorer::{Explorer, Fetch};
use crate::model::{BackendStatus, ChatMessage, ChatReply, FileEntry, IngestReport, Mode};
use crate::transcript::Transcript;
use crate::ui;

pub const GREETING: &str = "Hello! Select a folder to analyze to get started.";
pub const CHAT_ERROR: &str = "Connection error: the assistant could not be reached.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Explorer,
    Chat,
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Unknown,
    Online(BackendStatus),
    Unreachable,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub mode: Mode,
    pub backend: Backend,
    /// Modal message shown over everything until dismissed.
    pub alert: Option<String>,

    // Explorer
    pub explorer: Explorer,

    // Chat state
    pub transcript: Transcript,
    pub chat_lines: Vec<Line<'static>>,
    rendered_messages: usize,
    pub chat_scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16,
    pub input: String,
    pub input_cursor: usize,

    // Animation state
    pub animation_frame: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub explorer_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    /// Where mode changes are persisted; `None` means the default location.
    pub config_path: Option<PathBuf>,

    client: RagClient,
    browse_task: Option<(String, JoinHandle<ApiResult<Vec<FileEntry>>>)>,
    ingest_task: Option<(String, JoinHandle<ApiResult<IngestReport>>)>,
    chat_task: Option<JoinHandle<ApiResult<ChatReply>>>,
    status_task: Option<JoinHandle<ApiResult<BackendStatus>>>,
}

impl App {
    pub fn new(client: RagClient, mode: Mode) -> Self {
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Explorer,
            mode,
            backend: Backend::Unknown,
            alert: None,

            explorer: Explorer::new(),

            transcript: Transcript::with_greeting(GREETING),
            chat_lines: Vec::new(),
            rendered_messages: 0,
            chat_scroll: 0,
            follow_tail: true,
            chat_height: 0,
            input: String::new(),
            input_cursor: 0,

            animation_frame: 0,

            explorer_area: None,
            chat_area: None,

            config_path: None,

            client,
            browse_task: None,
            ingest_task: None,
            chat_task: None,
            status_task: None,
        };
        app.sync_chat_lines();
        app
    }

    /// Kick off the initial root listing and the health check.
    pub fn start(&mut self) {
        let fetch = self.explorer.mount();
        self.fetch(fetch);

        let client = self.client.clone();
        self.status_task = Some(tokio::spawn(async move { client.status().await }));
    }

    pub fn is_ingesting(&self) -> bool {
        self.ingest_task.is_some()
    }

    pub fn is_chatting(&self) -> bool {
        self.chat_task.is_some()
    }

    pub fn is_listing(&self) -> bool {
        self.browse_task.is_some()
    }

    // Navigation

    pub fn fetch(&mut self, fetch: Fetch) {
        let client = self.client.clone();
        let path = fetch.path;
        let request_path = path.clone();
        // A newer listing supersedes the outstanding one; its reply is dropped.
        self.browse_task = Some((
            path,
            tokio::spawn(async move { client.browse(&request_path).await }),
        ));
    }

    pub fn enter_directory(&mut self, name: &str) {
        let fetch = self.explorer.enter(name);
        self.fetch(fetch);
    }

    pub fn open_cursor(&mut self) {
        match self.explorer.open_cursor() {
            Some(fetch) => self.fetch(fetch),
            None => self.explorer.select_cursor(),
        }
    }

    pub fn go_up(&mut self) {
        if let Some(fetch) = self.explorer.go_up() {
            self.fetch(fetch);
        }
    }

    pub fn refresh(&mut self) {
        let fetch = self.explorer.refresh();
        self.fetch(fetch);
    }

    /// Click on the explorer row at `index`: first click selects, clicking an
    /// already selected directory enters it.
    pub fn click_entry(&mut self, index: usize) {
        if !self.explorer.is_listing_current() {
            return;
        }
        let Some(entry) = self.explorer.entries().get(index).cloned() else {
            return;
        };
        self.explorer.list_state.select(Some(index));
        if entry.is_dir() && self.explorer.is_selected(&entry) {
            self.explorer.list_state.select(Some(0));
            self.enter_directory(&entry.name);
        } else {
            self.explorer.select(&entry);
        }
    }

    fn finish_browse(&mut self, path: String, result: ApiResult<Vec<FileEntry>>) {
        match result {
            Ok(entries) => {
                tracing::debug!(%path, count = entries.len(), "listing received");
                self.explorer.apply_listing(&path, entries);
            }
            Err(err) => {
                tracing::error!(%path, op = ?err.operation(), error = %err, "request failed");
                self.alert = Some(format!(
                    "Unable to read the folder (does the backend have access?)\n\n{}",
                    err
                ));
            }
        }
    }

    // Ingestion

    pub fn can_ingest(&self) -> bool {
        self.explorer.selected_path().is_some() && !self.is_ingesting()
    }

    pub fn start_ingest(&mut self) {
        if !self.can_ingest() {
            return;
        }
        let Some(path) = self.explorer.selected_path().map(str::to_string) else {
            return;
        };
        tracing::info!(%path, "ingestion requested");
        self.push_message(ChatMessage::assistant(format!("Analyzing {}...", path)));

        let client = self.client.clone();
        let request_path = path.clone();
        self.ingest_task = Some((
            path,
            tokio::spawn(async move { client.ingest(&request_path).await }),
        ));
    }

    fn finish_ingest(&mut self, path: String, result: ApiResult<IngestReport>) {
        match result {
            Ok(report) => {
                tracing::info!(%path, count = %report.count, "ingestion complete");
                self.push_message(ChatMessage::assistant(format!(
                    "Analysis complete! I memorized {} fragments. Ask me a question.",
                    report.count
                )));
            }
            Err(err) => {
                tracing::error!(%path, op = ?err.operation(), error = %err, "request failed");
                self.alert = Some(format!("Ingestion error\n\n{}", err));
            }
        }
    }

    // Chat

    pub fn can_send(&self) -> bool {
        !self.input.trim().is_empty() && !self.is_chatting()
    }

    pub fn send_chat(&mut self) {
        if !self.can_send() {
            return;
        }
        let question = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.push_message(ChatMessage::user(question.clone()));

        let client = self.client.clone();
        let mode = self.mode;
        tracing::info!(mode = mode.as_str(), "chat question sent");
        self.chat_task = Some(tokio::spawn(async move { client.chat(&question, mode).await }));
    }

    fn finish_chat(&mut self, result: ApiResult<ChatReply>) {
        let message = match result {
            Ok(reply) => ChatMessage::assistant(reply.answer).with_sources(reply.sources),
            Err(err) => {
                tracing::error!(op = ?err.operation(), error = %err, "request failed");
                ChatMessage::assistant(CHAT_ERROR)
            }
        };
        self.push_message(message);
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        if let Err(err) = Config::save_mode(self.config_path.as_deref(), self.mode) {
            tracing::warn!(error = %err, "could not persist mode");
        }
    }

    // Background tasks

    /// Reap finished requests and apply their results.
    pub async fn poll_tasks(&mut self) {
        if self.browse_task.as_ref().is_some_and(|(_, h)| h.is_finished()) {
            if let Some((path, handle)) = self.browse_task.take() {
                let result = join(handle, "browse").await;
                self.finish_browse_joined(path, result);
            }
        }
        if self.ingest_task.as_ref().is_some_and(|(_, h)| h.is_finished()) {
            if let Some((path, handle)) = self.ingest_task.take() {
                let result = join(handle, "ingest").await;
                self.finish_ingest_joined(path, result);
            }
        }
        if self.chat_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.chat_task.take() {
                let result = join(handle, "chat").await;
                match result {
                    Some(result) => self.finish_chat(result),
                    None => self.push_message(ChatMessage::assistant(CHAT_ERROR)),
                }
            }
        }
        if self.status_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.status_task.take() {
                self.backend = match join(handle, "status").await {
                    Some(Ok(status)) => Backend::Online(status),
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "backend health check failed");
                        Backend::Unreachable
                    }
                    None => Backend::Unreachable,
                };
            }
        }
    }

    fn finish_browse_joined(&mut self, path: String, result: Option<ApiResult<Vec<FileEntry>>>) {
        match result {
            Some(result) => self.finish_browse(path, result),
            None => self.alert = Some("Unable to read the folder".to_string()),
        }
    }

    fn finish_ingest_joined(&mut self, path: String, result: Option<ApiResult<IngestReport>>) {
        match result {
            Some(result) => self.finish_ingest(path, result),
            None => self.alert = Some("Ingestion error".to_string()),
        }
    }

    /// Wait for every outstanding request and apply the results.
    #[cfg(test)]
    pub async fn settle(&mut self) {
        while self.browse_task.is_some()
            || self.ingest_task.is_some()
            || self.chat_task.is_some()
            || self.status_task.is_some()
        {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.poll_tasks().await;
        }
    }

    // Transcript view

    pub fn push_message(&mut self, message: ChatMessage) {
        self.transcript.push(message);
        self.sync_chat_lines();
        self.scroll_chat_to_bottom();
    }

    /// Render messages appended since the last call. The transcript only
    /// grows, so earlier lines never need re-rendering.
    fn sync_chat_lines(&mut self) {
        for message in &self.transcript.messages()[self.rendered_messages..] {
            self.chat_lines.extend(ui::message_lines(message));
        }
        self.rendered_messages = self.transcript.len();
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_tail = true;
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    pub fn tick_animation(&mut self) {
        if self.is_chatting() || self.is_ingesting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }
}

async fn join<T>(handle: JoinHandle<T>, what: &str) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(task = what, error = %err, "request task aborted");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatRole, EntryKind, Source};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_root_listing(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/browse"))
            .and(body_json(json!({ "path": "" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "docs", "type": "directory", "path": "docs" },
                { "name": "readme.md", "type": "file", "path": "readme.md" }
            ])))
            .mount(server)
            .await;
    }

    async fn started_app(server: &MockServer) -> App {
        mock_root_listing(server).await;
        let mut app = App::new(RagClient::new(&server.uri()), Mode::Local);
        app.fetch(app.explorer.mount());
        app.settle().await;
        app
    }

    #[tokio::test]
    async fn test_mount_lists_root_and_selection_does_not_navigate() {
        let server = MockServer::start().await;
        let mut app = started_app(&server).await;

        assert_eq!(app.explorer.entries().len(), 2);
        assert_eq!(app.explorer.entries()[0].kind, EntryKind::Directory);

        app.click_entry(1);
        assert_eq!(app.explorer.selected_path(), Some("readme.md"));
        assert_eq!(app.explorer.current_path(), "");
        assert!(!app.is_listing());
    }

    #[tokio::test]
    async fn test_double_click_directory_enters_and_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/browse"))
            .and(body_json(json!({ "path": "docs" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "guide.pdf", "type": "file", "path": "docs/guide.pdf" }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let mut app = started_app(&server).await;

        app.click_entry(0);
        assert_eq!(app.explorer.selected_path(), Some("docs"));
        app.click_entry(0);
        assert_eq!(app.explorer.current_path(), "docs");
        assert_eq!(app.explorer.selected_path(), None);
        assert!(app.is_listing());

        app.settle().await;
        assert_eq!(app.explorer.entries().len(), 1);
        assert_eq!(app.explorer.entries()[0].path, "docs/guide.pdf");
    }

    #[tokio::test]
    async fn test_browse_failure_alerts_and_keeps_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/browse"))
            .and(body_json(json!({ "path": "docs" })))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let mut app = started_app(&server).await;

        app.enter_directory("docs");
        app.settle().await;

        assert!(app.alert.is_some());
        assert_eq!(app.explorer.entries().len(), 2);
        assert_eq!(app.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_clicks_wait_for_pending_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/browse"))
            .and(body_json(json!({ "path": "docs" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let mut app = started_app(&server).await;

        app.open_cursor();
        app.open_cursor();
        app.click_entry(1);
        assert_eq!(app.explorer.current_path(), "docs");
        assert_eq!(app.explorer.selected_path(), None);
        assert!(!app.can_ingest());

        app.settle().await;
        assert!(app.explorer.is_listing_current());
        assert!(app.explorer.entries().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_reports_count_after_progress_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ingest"))
            .and(body_json(json!({ "path": "docs" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "chunks_created": 42 })))
            .mount(&server)
            .await;
        let mut app = started_app(&server).await;

        assert!(!app.can_ingest());
        app.click_entry(0);
        app.start_ingest();
        assert!(app.is_ingesting());
        assert!(!app.can_ingest());
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.last().unwrap().content, "Analyzing docs...");

        app.settle().await;
        assert!(!app.is_ingesting());
        assert_eq!(app.transcript.len(), 3);
        let done = app.transcript.last().unwrap();
        assert_eq!(done.role, ChatRole::Assistant);
        assert!(done.content.contains("42"));
    }

    #[tokio::test]
    async fn test_ingest_failure_only_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ingest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let mut app = started_app(&server).await;

        app.click_entry(1);
        app.start_ingest();
        app.settle().await;

        assert!(!app.is_ingesting());
        assert!(app.alert.as_deref().unwrap().contains("ingestion failed"));
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.last().unwrap().content, "Analyzing readme.md...");
    }

    #[tokio::test]
    async fn test_chat_appends_question_then_answer_with_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({ "question": "What is X?", "mode": "local" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "X is...",
                "sources": [{ "source": "a.pdf", "path": "/a.pdf" }]
            })))
            .mount(&server)
            .await;
        let mut app = App::new(RagClient::new(&server.uri()), Mode::Local);

        for c in "What is X?".chars() {
            app.insert_char(c);
        }
        app.send_chat();

        assert!(app.is_chatting());
        assert!(app.input.is_empty());
        assert_eq!(app.transcript.last(), Some(&ChatMessage::user("What is X?")));

        app.settle().await;
        assert!(!app.is_chatting());
        assert_eq!(app.transcript.len(), 3);
        assert_eq!(
            app.transcript.last(),
            Some(&ChatMessage::assistant("X is...").with_sources(vec![Source {
                source: "a.pdf".to_string(),
                path: "/a.pdf".to_string(),
            }]))
        );
    }

    #[tokio::test]
    async fn test_chat_failure_becomes_transcript_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let mut app = App::new(RagClient::new(&server.uri()), Mode::Cloud);

        app.input = "hello".to_string();
        app.send_chat();
        app.settle().await;

        assert!(!app.is_chatting());
        assert_eq!(app.transcript.last(), Some(&ChatMessage::assistant(CHAT_ERROR)));
    }

    #[tokio::test]
    async fn test_blank_input_is_not_sent() {
        let server = MockServer::start().await;
        let mut app = App::new(RagClient::new(&server.uri()), Mode::Local);

        app.input = "   ".to_string();
        app.send_chat();
        assert!(!app.is_chatting());
        assert_eq!(app.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_second_chat_is_blocked_while_busy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "answer": "ok" }))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let mut app = App::new(RagClient::new(&server.uri()), Mode::Local);

        app.input = "one".to_string();
        app.send_chat();
        app.input = "two".to_string();
        assert!(!app.can_send());
        app.send_chat();
        assert_eq!(app.input, "two");

        app.settle().await;
        let contents: Vec<&str> = app.transcript.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![GREETING, "one", "ok"]);
    }

    #[tokio::test]
    async fn test_health_check_sets_backend_state() {
        let server = MockServer::start().await;
        mock_root_listing(&server).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Active",
                "system": "Portable RAG v1.0"
            })))
            .mount(&server)
            .await;
        let mut app = App::new(RagClient::new(&server.uri()), Mode::Local);

        app.start();
        app.settle().await;
        assert_eq!(
            app.backend,
            Backend::Online(BackendStatus {
                status: "Active".to_string(),
                system: "Portable RAG v1.0".to_string(),
            })
        );
        assert_eq!(app.explorer.entries().len(), 2);
    }

    #[test]
    fn test_toggle_mode_persists_choice() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let mut app = App::new(RagClient::new("http://localhost:1"), Mode::Local);
        app.config_path = Some(config_path.clone());

        app.toggle_mode();
        assert_eq!(app.mode, Mode::Cloud);
        assert_eq!(Config::load_from(&config_path).unwrap().mode, Mode::Cloud);

        app.toggle_mode();
        assert_eq!(Config::load_from(&config_path).unwrap().mode, Mode::Local);
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut app = App::new(RagClient::new("http://localhost:1"), Mode::Local);

        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.cursor_left();
        app.cursor_left();
        app.delete_before_cursor();
        assert_eq!(app.input, "hélo");
        app.cursor_home();
        app.delete_at_cursor();
        assert_eq!(app.input, "élo");
        app.cursor_end();
        assert_eq!(app.input_cursor, 3);
    }
}
