use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use docquery_core::{
    BackendMessageId, ChatReply, ChatSession, Document, DocumentId, Feedback, FileKind,
    StoredExchange, StreamEvent, UploadId,
};
use docquery_logging::{dq_debug, dq_info};

use crate::{ApiClient, ApiError, ChatRequest, ClientConfig, DocQueryApi};

enum EngineCommand {
    SendChat {
        request: ChatRequest,
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
    Upload {
        upload_id: UploadId,
        path: PathBuf,
        name: String,
        kind: FileKind,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One frame of the in-flight streaming answer.
    Stream(StreamEvent),
    /// The streaming connection closed; carries the delivered event count.
    StreamClosed(Result<usize, ApiError>),
    ChatReplied(Result<ChatReply, ApiError>),
    FeedbackSubmitted {
        message_id: BackendMessageId,
        result: Result<(), ApiError>,
    },
    SessionsLoaded(Result<Vec<ChatSession>, ApiError>),
    SessionMessagesLoaded {
        session_id: String,
        result: Result<Vec<StoredExchange>, ApiError>,
    },
    DocumentsLoaded(Result<Vec<Document>, ApiError>),
    DocumentActionFinished {
        document_id: DocumentId,
        result: Result<(), ApiError>,
    },
    UploadFinished {
        upload_id: UploadId,
        result: Result<DocumentId, ApiError>,
    },
}

/// Runs backend requests on a background tokio runtime. Each command becomes
/// an independent task; results come back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = ApiClient::new(config)?;
        Self::with_api(Arc::new(client)).map_err(|err| ApiError::from_message(err.to_string()))
    }

    pub fn with_api(api: Arc<dyn DocQueryApi>) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("docquery-engine".to_string())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    let api = api.clone();
                    let event_tx = event_tx.clone();
                    runtime.spawn(async move {
                        handle_command(api.as_ref(), command, event_tx).await;
                    });
                }
                dq_debug!("Engine command channel closed");
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn send_chat(&self, session_id: Option<String>, message: String, stream: bool) {
        self.submit(EngineCommand::SendChat {
            request: ChatRequest {
                session_id,
                message,
            },
            stream,
        });
    }

    pub fn submit_feedback(&self, message_id: BackendMessageId, feedback: Feedback) {
        self.submit(EngineCommand::SubmitFeedback {
            message_id,
            feedback,
        });
    }

    pub fn load_sessions(&self) {
        self.submit(EngineCommand::LoadSessions);
    }

    pub fn load_session_messages(&self, session_id: impl Into<String>) {
        self.submit(EngineCommand::LoadSessionMessages {
            session_id: session_id.into(),
        });
    }

    pub fn load_documents(&self) {
        self.submit(EngineCommand::LoadDocuments);
    }

    pub fn process_document(&self, document_id: DocumentId) {
        self.submit(EngineCommand::ProcessDocument { document_id });
    }

    pub fn delete_document(&self, document_id: DocumentId) {
        self.submit(EngineCommand::DeleteDocument { document_id });
    }

    pub fn upload(&self, upload_id: UploadId, path: PathBuf, name: String, kind: FileKind) {
        self.submit(EngineCommand::Upload {
            upload_id,
            path,
            name,
            kind,
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn submit(&self, command: EngineCommand) {
        // The worker only exits when this handle is dropped.
        let _ = self.cmd_tx.send(command);
    }
}

async fn handle_command(
    api: &dyn DocQueryApi,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    // Send failures mean the UI is gone; stale results are dropped.
    let event = match command {
        EngineCommand::SendChat { request, stream } => {
            dq_info!(
                "SendChat session={:?} len={} stream={}",
                request.session_id,
                request.message.len(),
                stream
            );
            if stream {
                let frames = event_tx.clone();
                let mut forward = move |event: StreamEvent| {
                    let _ = frames.send(EngineEvent::Stream(event));
                };
                EngineEvent::StreamClosed(api.send_chat_stream(&request, &mut forward).await)
            } else {
                EngineEvent::ChatReplied(api.send_chat(&request).await)
            }
        }
        EngineCommand::SubmitFeedback {
            message_id,
            feedback,
        } => EngineEvent::FeedbackSubmitted {
            message_id,
            result: api
                .submit_feedback(message_id, feedback)
                .await
                .map(|_| ()),
        },
        EngineCommand::LoadSessions => EngineEvent::SessionsLoaded(api.list_sessions().await),
        EngineCommand::LoadSessionMessages { session_id } => {
            let result = api.session_messages(&session_id).await;
            EngineEvent::SessionMessagesLoaded { session_id, result }
        }
        EngineCommand::LoadDocuments => EngineEvent::DocumentsLoaded(
            api.list_documents().await.map(|list| list.documents),
        ),
        EngineCommand::ProcessDocument { document_id } => EngineEvent::DocumentActionFinished {
            document_id,
            result: api.process_document(document_id).await.map(|_| ()),
        },
        EngineCommand::DeleteDocument { document_id } => EngineEvent::DocumentActionFinished {
            document_id,
            result: api.delete_document(document_id).await.map(|_| ()),
        },
        EngineCommand::Upload {
            upload_id,
            path,
            name,
            kind,
        } => EngineEvent::UploadFinished {
            upload_id,
            result: api
                .upload_document(&path, &name, kind)
                .await
                .map(|receipt| receipt.document_id),
        },
    };
    let _ = event_tx.send(event);
}
