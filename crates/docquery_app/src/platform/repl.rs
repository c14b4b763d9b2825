//! Interactive chat: reads lines, drives `AppState` through `update`, and
//! runs the resulting effects on the engine thread.
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use docquery_core::{update, AppState, Feedback, Msg, SelectedFile, UploadStage};
use docquery_engine::{
    write_export, ConversationExport, EngineHandle, ExportError, ExportFormat, ExportSummary,
};
use docquery_logging::dq_info;

use super::effects::EffectRunner;
use super::render::{self, ChatPrinter};
use super::Settings;

const TICK: Duration = Duration::from_millis(75);

const HELP: &str = "\
Type a question to ask it. Commands:
  /clear                   start a new conversation
  /stream on|off           stream answers as they are generated
  /sessions                list stored sessions
  /open <session-id>       continue a stored session
  /good <id>, /bad <id>    rate an answer by its #id
  /export <csv|json|md|txt>
  /docs                    list documents
  /process <doc-id>        process a listed document
  /delete <doc-id>         delete a listed document
  /upload <file>...        upload files (pdf, md, html, txt; max 10 MB)
  /uploads [clear | process <upload-id>]
  /help, /quit";

#[derive(Debug, Clone, PartialEq)]
enum Input {
    Empty,
    Ask(String),
    Dispatch(Msg),
    ListDocuments,
    Upload(Vec<PathBuf>),
    ShowUploads,
    Export(ExportFormat),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Ask(line.to_string());
    };
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (name, args.as_slice()) {
        ("quit" | "exit" | "q", []) => Input::Quit,
        ("help" | "?", []) => Input::Help,
        ("clear", []) => Input::Dispatch(Msg::ClearChat),
        ("stream", ["on"]) => Input::Dispatch(Msg::StreamingToggled(true)),
        ("stream", ["off"]) => Input::Dispatch(Msg::StreamingToggled(false)),
        ("sessions", []) => Input::Dispatch(Msg::SessionsRequested),
        ("open", [session_id]) => Input::Dispatch(Msg::SessionSelected(session_id.to_string())),
        ("good" | "bad", [id]) => match id.trim_start_matches('#').parse() {
            Ok(message_id) => Input::Dispatch(Msg::FeedbackClicked {
                message_id,
                feedback: if name == "good" {
                    Feedback::Positive
                } else {
                    Feedback::Negative
                },
            }),
            Err(_) => Input::Invalid(format!("not a message id: {id}")),
        },
        ("export", [format]) => match format.parse() {
            Ok(format) => Input::Export(format),
            Err(err) => Input::Invalid(format!("{err}")),
        },
        ("docs", []) => Input::ListDocuments,
        ("process" | "delete", [id]) => match id.parse() {
            Ok(document_id) if name == "process" => {
                Input::Dispatch(Msg::ProcessClicked(document_id))
            }
            Ok(document_id) => Input::Dispatch(Msg::DeleteClicked(document_id)),
            Err(_) => Input::Invalid(format!("not a document id: {id}")),
        },
        ("upload", paths) if !paths.is_empty() => {
            Input::Upload(paths.iter().map(PathBuf::from).collect())
        }
        ("uploads", []) => Input::ShowUploads,
        ("uploads", ["clear"]) => Input::Dispatch(Msg::ClearFinishedUploads),
        ("uploads", ["process", id]) => match id.parse() {
            Ok(upload_id) => Input::Dispatch(Msg::ProcessUploadClicked(upload_id)),
            Err(_) => Input::Invalid(format!("not an upload id: {id}")),
        },
        _ => Input::Invalid(format!("unknown command /{command}; try /help")),
    }
}

fn select_file(path: &Path) -> io::Result<SelectedFile> {
    let metadata = fs::metadata(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SelectedFile {
        path: path.to_path_buf(),
        name,
        mime: None,
        size: metadata.len(),
    })
}

struct ChatLoop {
    state: AppState,
    runner: EffectRunner,
    printer: ChatPrinter,
    documents_requested: bool,
}

impl ChatLoop {
    fn dispatch(&mut self, msg: Msg) -> io::Result<()> {
        let replaces_conversation =
            matches!(msg, Msg::ClearChat | Msg::SessionMessagesLoaded { .. });
        let sent = matches!(msg, Msg::SendClicked { .. });
        let sessions_loaded = matches!(msg, Msg::SessionsLoaded(_));
        let documents_loaded = matches!(msg, Msg::DocumentsLoaded(_));

        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let view = state.view();
        let was_dirty = state.consume_dirty();
        self.state = state;
        self.runner.enqueue(effects);

        if replaces_conversation {
            self.printer.reset();
        }
        if sent {
            // The question is already on screen.
            self.printer.skip_to(view.messages.len());
        }
        let mut stdout = io::stdout();
        if was_dirty {
            self.printer.render(&view, &mut stdout)?;
        }
        if sessions_loaded {
            write!(stdout, "{}", render::sessions(&view.sessions))?;
        }
        if documents_loaded && self.documents_requested {
            self.documents_requested = false;
            write!(stdout, "{}", render::document_rows(&view.documents))?;
        }
        stdout.flush()
    }

    /// Runs engine work to completion, ticking upload progress meanwhile.
    fn pump(&mut self) -> io::Result<()> {
        while self.runner.pending() > 0 {
            match self.runner.next_msg(TICK) {
                Some(msg) => self.dispatch(msg)?,
                None => {
                    self.dispatch(Msg::Tick)?;
                    self.print_upload_progress()?;
                }
            }
        }
        Ok(())
    }

    fn print_upload_progress(&self) -> io::Result<()> {
        let active: Vec<String> = self
            .state
            .view()
            .uploads
            .iter()
            .filter_map(|row| match row.stage {
                UploadStage::Uploading { progress } => Some(format!("{} {progress}%", row.name)),
                _ => None,
            })
            .collect();
        if active.is_empty() {
            return Ok(());
        }
        let mut stdout = io::stdout();
        write!(stdout, "\ruploading: {}", active.join(", "))?;
        stdout.flush()
    }

    fn print_uploads(&self) {
        let uploads = self.state.view().uploads;
        if uploads.is_empty() {
            println!("No uploads.");
        } else {
            print!("{}", render::uploads(&uploads));
        }
    }

    fn export(&self, format: ExportFormat, dir: &Path) -> Result<ExportSummary, ExportError> {
        let export = ConversationExport {
            session_id: self.state.session_id().map(ToOwned::to_owned),
            exported_at: Local::now().naive_local(),
            messages: self.state.messages().to_vec(),
        };
        write_export(dir, &export, format)
    }
}

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let engine = EngineHandle::new(settings.client.clone())?;
    let mut chat = ChatLoop {
        state: AppState::new(),
        runner: EffectRunner::new(engine),
        printer: ChatPrinter::default(),
        documents_requested: false,
    };
    chat.dispatch(Msg::StreamingToggled(settings.stream_by_default))?;

    println!(
        "Connected to {}. /help lists commands.",
        settings.client.base_url()
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        match parse_input(&line?) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Invalid(message) => eprintln!("{message}"),
            Input::Ask(question) => {
                chat.dispatch(Msg::InputChanged(question))?;
                chat.dispatch(Msg::SendClicked {
                    at: Local::now().naive_local(),
                })?;
            }
            Input::Dispatch(msg) => chat.dispatch(msg)?,
            Input::ListDocuments => {
                chat.documents_requested = true;
                chat.dispatch(Msg::DocumentsRequested)?;
            }
            Input::Upload(paths) => {
                let mut files = Vec::with_capacity(paths.len());
                for path in paths {
                    match select_file(&path) {
                        Ok(file) => files.push(file),
                        Err(err) => eprintln!("{}: {err}", path.display()),
                    }
                }
                chat.dispatch(Msg::FilesSelected(files))?;
                chat.pump()?;
                println!();
                chat.print_uploads();
                continue;
            }
            Input::ShowUploads => chat.print_uploads(),
            Input::Export(format) => {
                if chat.state.messages().is_empty() {
                    println!("Nothing to export yet.");
                    continue;
                }
                match chat.export(format, &settings.export_dir) {
                    Ok(summary) => {
                        dq_info!("Exported conversation to {:?}", summary.output_path);
                        println!(
                            "wrote {} messages to {}",
                            summary.message_count,
                            summary.output_path.display()
                        );
                    }
                    Err(err) => eprintln!("export failed: {err}"),
                }
            }
        }
        chat.pump()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_input("  what is RAG?  "),
            Input::Ask("what is RAG?".to_string())
        );
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn rating_commands_accept_hash_ids() {
        assert_eq!(
            parse_input("/good #12"),
            Input::Dispatch(Msg::FeedbackClicked {
                message_id: 12,
                feedback: Feedback::Positive,
            })
        );
        assert_eq!(
            parse_input("/bad 3"),
            Input::Dispatch(Msg::FeedbackClicked {
                message_id: 3,
                feedback: Feedback::Negative,
            })
        );
        assert!(matches!(parse_input("/good x"), Input::Invalid(_)));
    }

    #[test]
    fn document_and_upload_commands() {
        assert_eq!(
            parse_input("/process 7"),
            Input::Dispatch(Msg::ProcessClicked(7))
        );
        assert_eq!(parse_input("/delete 7"), Input::Dispatch(Msg::DeleteClicked(7)));
        assert_eq!(
            parse_input("/upload a.pdf b.md"),
            Input::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("b.md")])
        );
        assert_eq!(
            parse_input("/uploads process 2"),
            Input::Dispatch(Msg::ProcessUploadClicked(2))
        );
        assert!(matches!(parse_input("/upload"), Input::Invalid(_)));
    }

    #[test]
    fn export_format_is_validated() {
        assert_eq!(parse_input("/export csv"), Input::Export(ExportFormat::Csv));
        assert!(matches!(parse_input("/export pdf"), Input::Invalid(_)));
    }

    #[test]
    fn selected_file_carries_size() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("notes.md");
        fs::write(&path, "hello").unwrap();
        let file = select_file(&path).unwrap();
        assert_eq!(file.name, "notes.md");
        assert_eq!(file.size, 5);
        assert!(file.mime.is_none());
    }
}
