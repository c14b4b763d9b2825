//! One-shot subcommands: a single request, printed as text or as an
//! `{success, data, error}` envelope.
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use docquery_core::{update, AppState, Msg, StreamEvent, StreamTranscript};
use docquery_engine::{
    write_export, AnalysisRequest, ApiClient, ApiError, ApiResponse, ConversationExport,
    ExportFormat, ProcessReceipt, UploadReceipt,
};
use docquery_logging::dq_info;
use serde::Serialize;

use super::{render, Settings};
use crate::cli::{AskArgs, Command, DocsSubcommand, LlmSubcommand, SessionsSubcommand};

pub fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let client = ApiClient::new(settings.client.clone())?;
    runtime.block_on(execute(&client, command, settings))
}

async fn execute(client: &ApiClient, command: Command, settings: &Settings) -> anyhow::Result<()> {
    let json = settings.json;
    match command {
        Command::Health { detailed: false } => {
            emit(json, client.health().await, render::health)
        }
        Command::Health { detailed: true } => {
            emit(json, client.health_detailed().await, render::detailed_health)
        }
        Command::Docs(docs) => match docs.command {
            DocsSubcommand::List => emit(json, client.list_documents().await, |list| {
                render::documents(&list.documents)
            }),
            DocsSubcommand::Show {
                document_id,
                content,
            } => emit(json, client.get_document(document_id).await, |document| {
                render::document(document, content)
            }),
            DocsSubcommand::Chunks { document_id } => emit(
                json,
                client.document_chunks(document_id).await,
                |chunks| render::chunks(chunks),
            ),
            DocsSubcommand::Delete { document_id } => {
                emit(json, client.delete_document(document_id).await, |ack| {
                    format!("{}\n", ack.message)
                })
            }
            DocsSubcommand::Process { document_id } => {
                emit(json, client.process_document(document_id).await, |receipt| {
                    format!("{}\n", receipt.message)
                })
            }
            DocsSubcommand::Upload { files, process } => {
                upload_files(client, &files, process, json).await
            }
        },
        Command::Search { query, n_results } => emit(
            json,
            client.search_documents(&query, n_results).await,
            |hits| render::search_hits(hits),
        ),
        Command::Ask(args) => {
            if args.streaming(settings.stream_by_default) && !json {
                ask_streaming(client, &args).await
            } else {
                emit(json, client.query(&args.to_request()).await, render::query_response)
            }
        }
        Command::Analyze {
            document_id,
            kind,
            max_length,
            max_keywords,
        } => {
            let request = AnalysisRequest {
                document_id,
                analysis_type: kind.into(),
                max_length,
                max_keywords,
            };
            emit(json, client.analyze_document(&request).await, render::analysis)
        }
        Command::Llm(llm) => match llm.command {
            LlmSubcommand::Status => emit(json, client.llm_status().await, render::llm_status),
            LlmSubcommand::Models => emit(json, client.list_models().await, render::models),
        },
        Command::Sessions(sessions) => match sessions.command {
            SessionsSubcommand::List => emit(json, client.list_sessions().await, |sessions| {
                render::sessions(sessions)
            }),
            SessionsSubcommand::Show { session_id } => emit(
                json,
                client.session_messages(&session_id).await,
                |exchanges| render::exchanges(exchanges),
            ),
        },
        Command::Feedback {
            message_id,
            feedback,
        } => emit(
            json,
            client.submit_feedback(message_id, feedback).await,
            |ack| format!("{}\n", ack.message),
        ),
        Command::Stats { trends: false, .. } => {
            emit(json, client.feedback_stats().await, render::stats)
        }
        Command::Stats { trends: true, days } => emit(
            json,
            client.feedback_trends(days).await,
            |trends| render::trends(trends),
        ),
        Command::Export {
            session_id,
            format,
            out,
        } => {
            let dir = out.unwrap_or_else(|| settings.export_dir.clone());
            export_session(client, session_id, format, &dir, json).await
        }
        Command::Chat => anyhow::bail!("chat is only available interactively"),
    }
}

/// Prints a result; failures still print their envelope in JSON mode and
/// then fail the command.
fn emit<T, F>(json: bool, result: Result<T, ApiError>, human: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    if json {
        let envelope = ApiResponse::from(result);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return match envelope.error {
            Some(error) => Err(anyhow::anyhow!(error)),
            None => Ok(()),
        };
    }
    let value = result?;
    print!("{}", human(&value));
    Ok(())
}

async fn ask_streaming(client: &ApiClient, args: &AskArgs) -> anyhow::Result<()> {
    let mut transcript = StreamTranscript::new();
    let mut printed = String::new();
    let mut stdout = io::stdout();
    client
        .query_stream(&args.to_request(), |event| {
            transcript.apply(&event);
            if let StreamEvent::Content { content } = &event {
                printed.push_str(content);
                let _ = write!(stdout, "{content}");
                let _ = stdout.flush();
            }
        })
        .await?;

    if transcript.is_failed() {
        println!();
        anyhow::bail!("{}", transcript.text());
    }
    if transcript.is_empty() && !transcript.is_complete() {
        anyhow::bail!("stream ended without a response");
    }
    // The final frame is authoritative; fix up the line if it differs.
    if transcript.text() != printed {
        print!("\n{}", transcript.text());
    }
    println!();
    print!("{}", render::citations(transcript.citations()));
    Ok(())
}

/// An upload and, when requested, the processing call that followed it.
struct UploadOutcome {
    upload: Result<UploadReceipt, ApiError>,
    processing: Option<Result<ProcessReceipt, ApiError>>,
}

impl UploadOutcome {
    fn failed(&self) -> bool {
        self.upload.is_err() || matches!(self.processing, Some(Err(_)))
    }
}

async fn upload_one(client: &ApiClient, path: &Path, process: bool) -> UploadOutcome {
    let upload = client.upload_path(path).await;
    let processing = match &upload {
        Ok(receipt) if process => Some(client.process_document(receipt.document_id).await),
        _ => None,
    };
    UploadOutcome { upload, processing }
}

async fn upload_files(
    client: &ApiClient,
    files: &[PathBuf],
    process: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut failures = 0;
    for path in files {
        let outcome = upload_one(client, path, process).await;
        if outcome.failed() {
            failures += 1;
        }
        if json {
            println!("{}", serde_json::to_string(&ApiResponse::from(outcome.upload))?);
            if let Some(processing) = outcome.processing {
                println!("{}", serde_json::to_string(&ApiResponse::from(processing))?);
            }
            continue;
        }
        match outcome.upload {
            Ok(receipt) => print!("{}", render::upload_receipt(&receipt)),
            Err(err) => eprintln!("{}: {err}", path.display()),
        }
        match outcome.processing {
            Some(Ok(receipt)) => println!("{}", receipt.message),
            Some(Err(err)) => eprintln!("{}: processing failed: {err}", path.display()),
            None => {}
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} uploads failed", files.len());
    }
    Ok(())
}

async fn export_session(
    client: &ApiClient,
    session_id: String,
    format: ExportFormat,
    dir: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let exchanges = client.session_messages(&session_id).await?;
    // Reuse the chat state's conversion of stored exchanges into messages.
    let (state, _) = update(
        AppState::new(),
        Msg::SessionMessagesLoaded {
            session_id: session_id.clone(),
            exchanges,
        },
    );
    let export = ConversationExport {
        session_id: Some(session_id),
        exported_at: Local::now().naive_local(),
        messages: state.messages().to_vec(),
    };
    let summary = write_export(dir, &export, format)?;
    dq_info!("Exported {} messages to {:?}", summary.message_count, summary.output_path);

    if json {
        let envelope = ApiResponse {
            success: true,
            data: Some(&summary),
            error: None,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!(
            "wrote {} messages to {}",
            summary.message_count,
            summary.output_path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use docquery_engine::ClientConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ClientConfig::new(&format!("{}/api", server.uri())).unwrap();
        ApiClient::new(config).unwrap()
    }

    fn ask_args(argv: &[&str]) -> AskArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Ask(args) => args,
            other => panic!("expected ask, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn streamed_ask_without_frames_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/llm/query/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
            .mount(&server)
            .await;

        let args = ask_args(&["docquery", "ask", "what?", "--stream"]);
        let err = ask_streaming(&client_for(&server), &args)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "stream ended without a response");
    }

    #[tokio::test]
    async fn failed_processing_keeps_upload_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/documents/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "File uploaded successfully",
                "document_id": 31,
                "filename": "notes.md"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/documents/31/process"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("notes.md");
        std::fs::write(&file, "# Notes\n").unwrap();

        let outcome = upload_one(&client_for(&server), &file, true).await;
        assert_eq!(outcome.upload.as_ref().unwrap().document_id, 31);
        assert_eq!(outcome.processing, Some(Err(ApiError::HttpStatus(500))));
        assert!(outcome.failed());
    }

    #[tokio::test]
    async fn upload_without_process_flag_skips_processing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/documents/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "File uploaded successfully",
                "document_id": 4,
                "filename": "a.txt"
            })))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();

        let outcome = upload_one(&client_for(&server), &file, false).await;
        assert!(outcome.processing.is_none());
        assert!(!outcome.failed());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
