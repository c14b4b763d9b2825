use crate::{ChatPhase, ChatSession, Document, Message, UploadId, UploadStage};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub phase: ChatPhase,
    pub session_id: Option<String>,
    pub input: String,
    pub messages: Vec<Message>,
    /// Text streamed so far for the in-flight answer.
    pub streaming_text: Option<String>,
    pub stream_responses: bool,
    pub sessions: Vec<ChatSession>,
    pub documents: Vec<DocumentRowView>,
    pub uploads: Vec<UploadRowView>,
    pub notice: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRowView {
    pub document: Document,
    pub processing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRowView {
    pub upload_id: UploadId,
    pub name: String,
    pub size: u64,
    pub progress: u8,
    pub stage: UploadStage,
}
