use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use docquery_core::{Citation, Message};
use serde::Serialize;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Already-fetched conversation data to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationExport {
    pub session_id: Option<String>,
    pub exported_at: NaiveDateTime,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub message_count: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unknown export format '{0}' (expected csv, json, md or txt)")]
    UnknownFormat(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn render_export(
    export: &ConversationExport,
    format: ExportFormat,
) -> Result<String, ExportError> {
    let rendered = match format {
        ExportFormat::Csv => render_csv(&export.messages),
        ExportFormat::Json => {
            #[derive(Serialize)]
            struct JsonExport<'a> {
                session_id: Option<&'a str>,
                exported_at: NaiveDateTime,
                message_count: usize,
                messages: &'a [Message],
            }
            let mut json = serde_json::to_string_pretty(&JsonExport {
                session_id: export.session_id.as_deref(),
                exported_at: export.exported_at,
                message_count: export.messages.len(),
                messages: &export.messages,
            })?;
            json.push('\n');
            json
        }
        ExportFormat::Markdown => render_markdown(export),
        ExportFormat::Text => render_text(&export.messages),
    };
    Ok(rendered)
}

/// `conversation-<session|new>-<YYYYMMDD-HHMMSS>.<ext>`
pub fn export_filename(export: &ConversationExport, format: ExportFormat) -> String {
    let session: String = export
        .session_id
        .as_deref()
        .unwrap_or("new")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!(
        "conversation-{}-{}.{}",
        session,
        export.exported_at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

pub fn write_export(
    output_dir: &Path,
    export: &ConversationExport,
    format: ExportFormat,
) -> Result<ExportSummary, ExportError> {
    let content = render_export(export, format)?;
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    let output_path = writer.write(&export_filename(export, format), content)?;
    Ok(ExportSummary {
        message_count: export.messages.len(),
        output_path,
    })
}

/// Quotes a CSV field when needed, doubling embedded quotes.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(messages: &[Message]) -> String {
    let mut out = String::from("timestamp,role,content,feedback,citations\n");
    for message in messages {
        let fields = [
            message.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            message.role.to_string(),
            message.content.clone(),
            message
                .feedback
                .map(|f| f.as_str().to_string())
                .unwrap_or_default(),
            citation_names(&message.citations).join("; "),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn render_markdown(export: &ConversationExport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# Conversation {}\n",
        export.session_id.as_deref().unwrap_or("(unsaved)")
    );
    let _ = writeln!(
        out,
        "Exported {} - {} messages\n",
        export.exported_at.format(TIMESTAMP_FORMAT),
        export.messages.len()
    );
    for message in &export.messages {
        let _ = writeln!(
            out,
            "## {} ({})\n",
            message.role.label(),
            message.timestamp.format(TIMESTAMP_FORMAT)
        );
        let _ = writeln!(out, "{}\n", message.content.trim_end());
        if !message.citations.is_empty() {
            out.push_str("Sources:\n");
            for citation in &message.citations {
                let _ = writeln!(out, "- {}", describe_citation(citation));
            }
            out.push('\n');
        }
        if let Some(feedback) = message.feedback {
            let _ = writeln!(out, "_Feedback: {feedback}_\n");
        }
    }
    out
}

fn render_text(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            message.timestamp.format(TIMESTAMP_FORMAT),
            message.role.label(),
            message.content
        );
    }
    out
}

fn citation_names(citations: &[Citation]) -> Vec<String> {
    citations.iter().map(describe_citation).collect()
}

fn describe_citation(citation: &Citation) -> String {
    match citation.page_number {
        Some(page) => format!(
            "{} (page {}, {}% relevant)",
            citation.filename,
            page,
            citation.relevance_percent()
        ),
        None => format!(
            "{} (chunk {}, {}% relevant)",
            citation.filename,
            citation.chunk_index,
            citation.relevance_percent()
        ),
    }
}
