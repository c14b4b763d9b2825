use docquery_logging::{dq_debug, dq_warn};

use crate::{validate_upload, AppState, ChatPhase, Effect, Msg, Role, UploadStage};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::SendClicked { at } => {
            let trimmed = state.input().trim().to_string();
            if trimmed.is_empty() || state.phase() != ChatPhase::Idle {
                return (state, Vec::new());
            }
            state.take_input();
            state.push_message(Role::User, trimmed.clone(), at, Vec::new(), None);
            state.begin_send();
            vec![Effect::SendChat {
                session_id: state.session_id().map(ToOwned::to_owned),
                message: trimmed,
                stream: state.stream_responses(),
            }]
        }
        Msg::StreamingToggled(enabled) => {
            state.set_stream_responses(enabled);
            Vec::new()
        }
        Msg::StreamEvent(event) => {
            state.apply_stream_event(&event);
            Vec::new()
        }
        Msg::ChatFinished { at } => {
            if state.phase() == ChatPhase::Idle {
                return (state, Vec::new());
            }
            let transcript = state.transcript().clone();
            if transcript.is_empty() && !transcript.is_complete() {
                push_failure(&mut state, "stream ended without a response", at);
            } else {
                state.adopt_session(transcript.session_id());
                state.push_message(
                    Role::Assistant,
                    transcript.text().to_string(),
                    at,
                    transcript.citations().to_vec(),
                    transcript.message_id(),
                );
            }
            state.finish_send();
            Vec::new()
        }
        Msg::ChatReplied { reply, at } => {
            if state.phase() == ChatPhase::Idle {
                return (state, Vec::new());
            }
            state.adopt_session(Some(&reply.session_id));
            state.push_message(
                Role::Assistant,
                reply.response,
                at,
                reply.citations,
                Some(reply.message_id),
            );
            state.finish_send();
            Vec::new()
        }
        Msg::ChatFailed { error, at } => {
            if state.phase() == ChatPhase::Idle {
                return (state, Vec::new());
            }
            push_failure(&mut state, &error, at);
            state.finish_send();
            Vec::new()
        }
        Msg::ClearChat => {
            state.clear_chat();
            Vec::new()
        }
        Msg::FeedbackClicked {
            message_id,
            feedback,
        } => {
            if state.set_feedback(message_id, feedback) {
                vec![Effect::SubmitFeedback {
                    message_id,
                    feedback,
                }]
            } else {
                dq_warn!("Feedback for unknown message_id={}", message_id);
                Vec::new()
            }
        }
        Msg::FeedbackFailed { message_id, error } => {
            dq_warn!("Feedback for message_id={} failed: {}", message_id, error);
            Vec::new()
        }
        Msg::SessionsRequested => vec![Effect::LoadSessions],
        Msg::SessionsLoaded(sessions) => {
            state.set_sessions(sessions);
            Vec::new()
        }
        Msg::SessionSelected(session_id) => {
            let session_id = session_id.trim().to_string();
            if session_id.is_empty() || state.phase() != ChatPhase::Idle {
                return (state, Vec::new());
            }
            vec![Effect::LoadSessionMessages { session_id }]
        }
        Msg::SessionMessagesLoaded {
            session_id,
            exchanges,
        } => {
            if state.phase() != ChatPhase::Idle {
                dq_debug!("Ignoring session {} load while a send is in flight", session_id);
                return (state, Vec::new());
            }
            state.load_session(session_id, exchanges);
            Vec::new()
        }
        Msg::DocumentsRequested => vec![Effect::LoadDocuments],
        Msg::DocumentsLoaded(documents) => {
            state.set_documents(documents);
            Vec::new()
        }
        Msg::ProcessClicked(document_id) => {
            if !state.has_document(document_id) || !state.mark_processing(document_id) {
                return (state, Vec::new());
            }
            vec![Effect::ProcessDocument { document_id }]
        }
        Msg::DeleteClicked(document_id) => {
            if !state.has_document(document_id) {
                return (state, Vec::new());
            }
            vec![Effect::DeleteDocument { document_id }]
        }
        Msg::DocumentActionFinished {
            document_id,
            result,
        } => {
            state.clear_processing(document_id);
            state.finish_upload_processing(document_id, &result);
            if let Err(err) = &result {
                state.set_notice(format!("Document {document_id}: {err}"));
            }
            vec![Effect::LoadDocuments]
        }
        Msg::FilesSelected(files) => {
            let mut effects = Vec::with_capacity(files.len());
            for file in files {
                match validate_upload(&file.name, file.mime.as_deref(), file.size) {
                    Ok(kind) => {
                        let upload_id = state.add_upload(
                            file.name.clone(),
                            file.size,
                            UploadStage::Uploading { progress: 0 },
                        );
                        effects.push(Effect::UploadFile {
                            upload_id,
                            path: file.path,
                            name: file.name,
                            kind,
                        });
                    }
                    Err(err) => {
                        state.add_upload(file.name, file.size, UploadStage::Error(err.to_string()));
                    }
                }
            }
            effects
        }
        Msg::UploadFinished { upload_id, result } => {
            match result {
                Ok(document_id) => {
                    state.set_upload_stage(upload_id, UploadStage::Uploaded { document_id });
                    vec![Effect::LoadDocuments]
                }
                Err(err) => {
                    state.set_upload_stage(upload_id, UploadStage::Error(err));
                    Vec::new()
                }
            }
        }
        Msg::ProcessUploadClicked(upload_id) => match state.upload_stage(upload_id) {
            Some(&UploadStage::Uploaded { document_id }) => {
                state.set_upload_stage(upload_id, UploadStage::Processing { document_id });
                state.mark_processing(document_id);
                vec![Effect::ProcessDocument { document_id }]
            }
            _ => Vec::new(),
        },
        Msg::ClearFinishedUploads => {
            state.clear_finished_uploads();
            Vec::new()
        }
        Msg::RequestFailed { context, error } => {
            state.set_notice(format!("{context}: {error}"));
            Vec::new()
        }
        Msg::Tick => {
            state.advance_upload_progress();
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// Appends the synthetic assistant message shown when a send fails, keeping
/// whatever text had already streamed.
fn push_failure(state: &mut AppState, error: &str, at: chrono::NaiveDateTime) {
    let partial = state.transcript().text().to_string();
    let content = if partial.is_empty() {
        format!("Sorry, I encountered an error: {error}")
    } else {
        format!("{partial}\n\n[Error: {error}]")
    };
    state.push_message(Role::Assistant, content, at, Vec::new(), None);
}
