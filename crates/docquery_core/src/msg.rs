use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::{
    BackendMessageId, ChatReply, ChatSession, Document, DocumentId, Feedback, StoredExchange,
    StreamEvent, UploadId,
};

/// A file the user picked for upload, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub mime: Option<String>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User edited the chat input.
    InputChanged(String),
    /// User submitted the current chat input.
    SendClicked { at: NaiveDateTime },
    /// User switched between streaming and request/response answers.
    StreamingToggled(bool),
    /// One frame of the in-flight streaming answer.
    StreamEvent(StreamEvent),
    /// The streaming answer's connection closed normally.
    ChatFinished { at: NaiveDateTime },
    /// Non-streaming answer arrived.
    ChatReplied { reply: ChatReply, at: NaiveDateTime },
    /// Sending or streaming failed.
    ChatFailed { error: String, at: NaiveDateTime },
    /// User cleared the conversation.
    ClearChat,
    /// User rated an assistant answer.
    FeedbackClicked {
        message_id: BackendMessageId,
        feedback: Feedback,
    },
    /// Feedback request failed; the displayed value is kept.
    FeedbackFailed {
        message_id: BackendMessageId,
        error: String,
    },
    /// User opened the session list.
    SessionsRequested,
    SessionsLoaded(Vec<ChatSession>),
    /// User picked a stored session to continue.
    SessionSelected(String),
    SessionMessagesLoaded {
        session_id: String,
        exchanges: Vec<StoredExchange>,
    },
    /// User opened the document list.
    DocumentsRequested,
    DocumentsLoaded(Vec<Document>),
    ProcessClicked(DocumentId),
    DeleteClicked(DocumentId),
    /// Backend finished a process or delete request.
    DocumentActionFinished {
        document_id: DocumentId,
        result: Result<(), String>,
    },
    /// User picked files for upload.
    FilesSelected(Vec<SelectedFile>),
    UploadFinished {
        upload_id: UploadId,
        result: Result<DocumentId, String>,
    },
    /// User asked to process a freshly uploaded file.
    ProcessUploadClicked(UploadId),
    ClearFinishedUploads,
    /// A load request failed; shown as a notice.
    RequestFailed { context: String, error: String },
    /// UI/render tick; drives the synthetic upload progress.
    Tick,
    /// An engine result that needs no state change, such as accepted feedback.
    NoOp,
}
