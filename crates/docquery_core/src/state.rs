use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use crate::view_model::{AppViewModel, DocumentRowView, UploadRowView};
use crate::{
    BackendMessageId, Citation, ChatSession, Document, DocumentId, Feedback, Message, MessageId,
    Role, StoredExchange, StreamEvent, StreamTranscript,
};

pub type UploadId = u64;

/// Synthetic progress increment applied per tick while a file uploads.
pub const UPLOAD_PROGRESS_STEP: u8 = 10;
/// Synthetic progress never passes this value until the backend answers.
pub const UPLOAD_PROGRESS_CAP: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStage {
    Uploading { progress: u8 },
    Uploaded { document_id: DocumentId },
    Processing { document_id: DocumentId },
    Processed { document_id: DocumentId },
    Error(String),
}

impl UploadStage {
    pub fn progress(&self) -> u8 {
        match self {
            UploadStage::Uploading { progress } => *progress,
            UploadStage::Error(_) => 0,
            _ => 100,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, UploadStage::Processed { .. } | UploadStage::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadRow {
    pub(crate) name: String,
    pub(crate) size: u64,
    pub(crate) stage: UploadStage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    input: String,
    messages: Vec<Message>,
    session_id: Option<String>,
    phase: ChatPhase,
    transcript: StreamTranscript,
    stream_responses: bool,
    next_message_id: MessageId,
    sessions: Vec<ChatSession>,
    documents: Vec<Document>,
    processing: BTreeSet<DocumentId>,
    uploads: BTreeMap<UploadId, UploadRow>,
    next_upload_id: UploadId,
    notice: Option<String>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            input: String::new(),
            messages: Vec::new(),
            session_id: None,
            phase: ChatPhase::Idle,
            transcript: StreamTranscript::new(),
            stream_responses: true,
            next_message_id: 1,
            sessions: Vec::new(),
            documents: Vec::new(),
            processing: BTreeSet::new(),
            uploads: BTreeMap::new(),
            next_upload_id: 1,
            notice: None,
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            phase: self.phase,
            session_id: self.session_id.clone(),
            input: self.input.clone(),
            messages: self.messages.clone(),
            streaming_text: match self.phase {
                ChatPhase::Streaming => Some(self.transcript.text().to_string()),
                _ => None,
            },
            stream_responses: self.stream_responses,
            sessions: self.sessions.clone(),
            documents: self
                .documents
                .iter()
                .map(|doc| DocumentRowView {
                    processing: self.processing.contains(&doc.id),
                    document: doc.clone(),
                })
                .collect(),
            uploads: self
                .uploads
                .iter()
                .map(|(upload_id, row)| UploadRowView {
                    upload_id: *upload_id,
                    name: row.name.clone(),
                    size: row.size,
                    progress: row.stage.progress(),
                    stage: row.stage.clone(),
                })
                .collect(),
            notice: self.notice.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn stream_responses(&self) -> bool {
        self.stream_responses
    }

    pub fn message_by_backend_id(&self, message_id: BackendMessageId) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.role == Role::Assistant && m.message_id == Some(message_id))
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_input(&mut self, input: String) {
        if self.input != input {
            self.input = input;
            self.mark_dirty();
        }
    }

    pub(crate) fn take_input(&mut self) -> String {
        self.mark_dirty();
        std::mem::take(&mut self.input)
    }

    pub(crate) fn set_stream_responses(&mut self, enabled: bool) {
        if self.stream_responses != enabled {
            self.stream_responses = enabled;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
        self.mark_dirty();
    }

    pub(crate) fn push_message(
        &mut self,
        role: Role,
        content: String,
        timestamp: NaiveDateTime,
        citations: Vec<Citation>,
        message_id: Option<BackendMessageId>,
    ) -> MessageId {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(Message {
            id,
            content,
            role,
            timestamp,
            citations,
            feedback: None,
            message_id,
        });
        self.mark_dirty();
        id
    }

    /// Starts a send: the user message is already appended by the caller.
    pub(crate) fn begin_send(&mut self) {
        self.phase = ChatPhase::Sending;
        self.transcript = StreamTranscript::new();
        self.notice = None;
        self.mark_dirty();
    }

    pub(crate) fn apply_stream_event(&mut self, event: &StreamEvent) {
        if self.phase == ChatPhase::Idle {
            return;
        }
        self.transcript.apply(event);
        if matches!(event, StreamEvent::Content { .. }) {
            self.phase = ChatPhase::Streaming;
        }
        self.mark_dirty();
    }

    pub(crate) fn transcript(&self) -> &StreamTranscript {
        &self.transcript
    }

    pub(crate) fn adopt_session(&mut self, session_id: Option<&str>) {
        if self.session_id.is_none() {
            if let Some(id) = session_id {
                self.session_id = Some(id.to_string());
                self.mark_dirty();
            }
        }
    }

    pub(crate) fn finish_send(&mut self) {
        self.phase = ChatPhase::Idle;
        self.transcript = StreamTranscript::new();
        self.mark_dirty();
    }

    pub(crate) fn clear_chat(&mut self) {
        self.messages.clear();
        self.session_id = None;
        self.phase = ChatPhase::Idle;
        self.transcript = StreamTranscript::new();
        self.input.clear();
        self.notice = None;
        self.mark_dirty();
    }

    /// Returns false when no assistant message carries that backend id.
    pub(crate) fn set_feedback(&mut self, message_id: BackendMessageId, feedback: Feedback) -> bool {
        let Some(message) = self
            .messages
            .iter_mut()
            .find(|m| m.role == Role::Assistant && m.message_id == Some(message_id))
        else {
            return false;
        };
        message.feedback = Some(feedback);
        self.mark_dirty();
        true
    }

    pub(crate) fn set_sessions(&mut self, sessions: Vec<ChatSession>) {
        self.sessions = sessions;
        self.mark_dirty();
    }

    /// Replaces the conversation with a stored session. Each stored exchange
    /// becomes a user message followed by an assistant message.
    pub(crate) fn load_session(&mut self, session_id: String, exchanges: Vec<StoredExchange>) {
        self.messages.clear();
        self.phase = ChatPhase::Idle;
        self.transcript = StreamTranscript::new();
        for exchange in exchanges {
            self.push_message(
                Role::User,
                exchange.message,
                exchange.created_at,
                Vec::new(),
                None,
            );
            self.push_message(
                Role::Assistant,
                exchange.response,
                exchange.created_at,
                Vec::new(),
                Some(exchange.id),
            );
            if let Some(feedback) = exchange.feedback.and_then(Feedback::from_score) {
                if let Some(last) = self.messages.last_mut() {
                    last.feedback = Some(feedback);
                }
            }
        }
        self.session_id = Some(session_id);
        self.mark_dirty();
    }

    pub(crate) fn set_documents(&mut self, documents: Vec<Document>) {
        self.documents = documents;
        self.mark_dirty();
    }

    pub(crate) fn has_document(&self, document_id: DocumentId) -> bool {
        self.documents.iter().any(|d| d.id == document_id)
    }

    pub(crate) fn mark_processing(&mut self, document_id: DocumentId) -> bool {
        let inserted = self.processing.insert(document_id);
        if inserted {
            self.mark_dirty();
        }
        inserted
    }

    pub(crate) fn clear_processing(&mut self, document_id: DocumentId) {
        if self.processing.remove(&document_id) {
            self.mark_dirty();
        }
    }

    pub(crate) fn add_upload(&mut self, name: String, size: u64, stage: UploadStage) -> UploadId {
        let upload_id = self.next_upload_id;
        self.next_upload_id += 1;
        self.uploads.insert(upload_id, UploadRow { name, size, stage });
        self.mark_dirty();
        upload_id
    }

    pub(crate) fn upload_stage(&self, upload_id: UploadId) -> Option<&UploadStage> {
        self.uploads.get(&upload_id).map(|row| &row.stage)
    }

    pub(crate) fn set_upload_stage(&mut self, upload_id: UploadId, stage: UploadStage) {
        if let Some(row) = self.uploads.get_mut(&upload_id) {
            if row.stage != stage {
                row.stage = stage;
                self.mark_dirty();
            }
        }
    }

    /// Moves the upload row that is processing `document_id`, if any.
    pub(crate) fn finish_upload_processing(
        &mut self,
        document_id: DocumentId,
        result: &Result<(), String>,
    ) {
        let mut changed = false;
        for row in self.uploads.values_mut() {
            if row.stage == (UploadStage::Processing { document_id }) {
                row.stage = match result {
                    Ok(()) => UploadStage::Processed { document_id },
                    Err(err) => UploadStage::Error(err.clone()),
                };
                changed = true;
            }
        }
        if changed {
            self.mark_dirty();
        }
    }

    pub(crate) fn advance_upload_progress(&mut self) {
        let mut changed = false;
        for row in self.uploads.values_mut() {
            if let UploadStage::Uploading { progress } = &mut row.stage {
                let next = progress
                    .saturating_add(UPLOAD_PROGRESS_STEP)
                    .min(UPLOAD_PROGRESS_CAP);
                if next != *progress {
                    *progress = next;
                    changed = true;
                }
            }
        }
        if changed {
            self.mark_dirty();
        }
    }

    pub(crate) fn clear_finished_uploads(&mut self) {
        let before = self.uploads.len();
        self.uploads.retain(|_, row| !row.stage.is_finished());
        if self.uploads.len() != before {
            self.mark_dirty();
        }
    }
}
