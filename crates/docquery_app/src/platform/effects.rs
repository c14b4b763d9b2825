use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use docquery_core::{Effect, Msg};
use docquery_engine::{EngineEvent, EngineHandle};
use docquery_logging::{dq_info, dq_warn};

/// Executes core effects on the engine and turns engine events back into
/// messages for `update`.
pub struct EffectRunner {
    engine: EngineHandle,
    pending: usize,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine, pending: 0 }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SendChat {
                    session_id,
                    message,
                    stream,
                } => self.engine.send_chat(session_id, message, stream),
                Effect::SubmitFeedback {
                    message_id,
                    feedback,
                } => self.engine.submit_feedback(message_id, feedback),
                Effect::LoadSessions => self.engine.load_sessions(),
                Effect::LoadSessionMessages { session_id } => {
                    self.engine.load_session_messages(session_id)
                }
                Effect::LoadDocuments => self.engine.load_documents(),
                Effect::ProcessDocument { document_id } => {
                    self.engine.process_document(document_id)
                }
                Effect::DeleteDocument { document_id } => self.engine.delete_document(document_id),
                Effect::UploadFile {
                    upload_id,
                    path,
                    name,
                    kind,
                } => {
                    dq_info!("UploadFile upload_id={} name={}", upload_id, name);
                    self.engine.upload(upload_id, path, name, kind);
                }
            }
            self.pending += 1;
        }
    }

    /// Requests still waiting for their final engine event.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn next_msg(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        if !matches!(event, EngineEvent::Stream(_)) {
            self.pending = self.pending.saturating_sub(1);
        }
        Some(map_event(event, now()))
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn map_event(event: EngineEvent, at: NaiveDateTime) -> Msg {
    match event {
        EngineEvent::Stream(event) => Msg::StreamEvent(event),
        EngineEvent::StreamClosed(Ok(_)) => Msg::ChatFinished { at },
        EngineEvent::StreamClosed(Err(err)) | EngineEvent::ChatReplied(Err(err)) => {
            dq_warn!("Chat request failed: {}", err);
            Msg::ChatFailed {
                error: err.to_string(),
                at,
            }
        }
        EngineEvent::ChatReplied(Ok(reply)) => Msg::ChatReplied { reply, at },
        EngineEvent::FeedbackSubmitted { message_id, result } => match result {
            Ok(()) => Msg::NoOp,
            Err(err) => Msg::FeedbackFailed {
                message_id,
                error: err.to_string(),
            },
        },
        EngineEvent::SessionsLoaded(result) => match result {
            Ok(sessions) => Msg::SessionsLoaded(sessions),
            Err(err) => Msg::RequestFailed {
                context: "Loading sessions".to_string(),
                error: err.to_string(),
            },
        },
        EngineEvent::SessionMessagesLoaded { session_id, result } => match result {
            Ok(exchanges) => Msg::SessionMessagesLoaded {
                session_id,
                exchanges,
            },
            Err(err) => Msg::RequestFailed {
                context: format!("Loading session {session_id}"),
                error: err.to_string(),
            },
        },
        EngineEvent::DocumentsLoaded(result) => match result {
            Ok(documents) => Msg::DocumentsLoaded(documents),
            Err(err) => Msg::RequestFailed {
                context: "Loading documents".to_string(),
                error: err.to_string(),
            },
        },
        EngineEvent::DocumentActionFinished {
            document_id,
            result,
        } => Msg::DocumentActionFinished {
            document_id,
            result: result.map_err(|err| err.to_string()),
        },
        EngineEvent::UploadFinished { upload_id, result } => Msg::UploadFinished {
            upload_id,
            result: result.map_err(|err| err.to_string()),
        },
    }
}
