//! Doc Query core: data model, upload validation and the pure chat/documents
//! state machine.
mod effect;
mod model;
mod msg;
mod state;
mod transcript;
mod update;
mod validate;
mod view_model;

pub use effect::Effect;
pub use model::{
    BackendMessageId, ChatReply, ChatSession, Citation, Document, DocumentId, Feedback, Message,
    MessageId, Role, StoredExchange, StreamEvent,
};
pub use msg::{Msg, SelectedFile};
pub use state::{
    AppState, ChatPhase, UploadId, UploadStage, UPLOAD_PROGRESS_CAP, UPLOAD_PROGRESS_STEP,
};
pub use transcript::StreamTranscript;
pub use update::update;
pub use validate::{validate_upload, FileKind, ValidationError, MAX_UPLOAD_BYTES};
pub use view_model::{AppViewModel, DocumentRowView, UploadRowView};
