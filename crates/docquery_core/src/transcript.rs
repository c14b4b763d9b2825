use crate::{BackendMessageId, Citation, StreamEvent};

/// Accumulates one streamed answer.
///
/// `Content` fragments append; `Complete` replaces the accumulated text with
/// the authoritative final answer. An `Error` frame replaces the text with the
/// backend's error content and marks the transcript failed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamTranscript {
    text: String,
    citations: Vec<Citation>,
    message_id: Option<BackendMessageId>,
    session_id: Option<String>,
    completed: bool,
    failed: bool,
    events: usize,
}

impl StreamTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &StreamEvent) {
        self.events += 1;
        match event {
            StreamEvent::Content { content } => self.text.push_str(content),
            StreamEvent::Complete {
                content,
                citations,
                message_id,
                session_id,
            } => {
                self.text.clone_from(content);
                self.citations.clone_from(citations);
                self.message_id = *message_id;
                if session_id.is_some() {
                    self.session_id.clone_from(session_id);
                }
                self.completed = true;
            }
            StreamEvent::Error {
                content,
                message_id,
                session_id,
            } => {
                self.text.clone_from(content);
                self.message_id = *message_id;
                if session_id.is_some() {
                    self.session_id.clone_from(session_id);
                }
                self.failed = true;
            }
            StreamEvent::Other => {}
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn message_id(&self) -> Option<BackendMessageId> {
        self.message_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn event_count(&self) -> usize {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
