use std::path::PathBuf;

use crate::{BackendMessageId, DocumentId, Feedback, FileKind, UploadId};

/// Side effects requested by `update`; executed by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SendChat {
        session_id: Option<String>,
        message: String,
        stream: bool,
    },
    SubmitFeedback {
        message_id: BackendMessageId,
        feedback: Feedback,
    },
    LoadSessions,
    LoadSessionMessages {
        session_id: String,
    },
    LoadDocuments,
    ProcessDocument {
        document_id: DocumentId,
    },
    DeleteDocument {
        document_id: DocumentId,
    },
    UploadFile {
        upload_id: UploadId,
        path: PathBuf,
        name: String,
        kind: FileKind,
    },
}
