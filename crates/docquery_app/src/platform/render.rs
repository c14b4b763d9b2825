//! Plain-text rendering of backend data and the chat view model.
use std::fmt::Write as _;
use std::io::{self, Write};

use docquery_core::{
    AppViewModel, ChatSession, Citation, Document, DocumentRowView, Message, Role, StoredExchange,
    UploadRowView, UploadStage,
};
use docquery_engine::{
    AnalysisResponse, DetailedHealth, DocumentChunk, FeedbackStats, FeedbackTrend, HealthStatus,
    LlmStatus, ModelList, QueryResponse, SearchHit, UploadReceipt,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn health(status: &HealthStatus) -> String {
    format!("{} {} v{}\n", status.service, status.status, status.version)
}

pub fn detailed_health(health: &DetailedHealth) -> String {
    let mut out = self::health(&health.health);
    let _ = writeln!(out, "database:    {}", health.database);
    let _ = writeln!(out, "upload dir:  {}", health.config.upload_dir);
    let _ = writeln!(out, "vector db:   {}", health.config.chroma_db_path);
    let _ = writeln!(
        out,
        "openai:      {}",
        if health.config.openai_configured {
            "configured"
        } else {
            "not configured"
        }
    );
    out
}

pub fn documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No documents uploaded.\n".to_string();
    }
    let mut out = String::new();
    for document in documents {
        let _ = writeln!(out, "{}", document_line(document, false));
    }
    out
}

pub fn document_rows(rows: &[DocumentRowView]) -> String {
    if rows.is_empty() {
        return "No documents uploaded.\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(out, "{}", document_line(&row.document, row.processing));
    }
    out
}

fn document_line(document: &Document, processing: bool) -> String {
    let status = if processing {
        "processing"
    } else if document.is_processed {
        "processed"
    } else {
        "uploaded"
    };
    format!(
        "{:>5}  {:<10}  {}  {} ({})",
        document.id,
        status,
        document.uploaded_at.format(TIME_FORMAT),
        document.filename,
        document.file_type
    )
}

pub fn document(document: &Document, with_content: bool) -> String {
    let mut out = document_line(document, false);
    out.push('\n');
    if with_content {
        match &document.content {
            Some(content) => {
                out.push('\n');
                out.push_str(content);
                out.push('\n');
            }
            None => out.push_str("(no extracted content)\n"),
        }
    }
    out
}

pub fn chunks(chunks: &[DocumentChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        let _ = writeln!(out, "--- chunk {} ---", chunk.chunk_id);
        let _ = writeln!(out, "{}", chunk.content.trim_end());
    }
    if out.is_empty() {
        out.push_str("No chunks; has the document been processed?\n");
    }
    out
}

pub fn search_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matches.\n".to_string();
    }
    let mut out = String::new();
    for (index, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({:.0}%)",
            index + 1,
            hit.filename(),
            hit.similarity_score.clamp(0.0, 1.0) * 100.0
        );
        let _ = writeln!(out, "   {}", excerpt(&hit.content, 160));
    }
    out
}

pub fn query_response(response: &QueryResponse) -> String {
    let mut out = response.response.trim_end().to_string();
    out.push('\n');
    if !response.context_used.is_empty() {
        let _ = writeln!(out, "\n({} context chunks used)", response.context_used.len());
    }
    out
}

pub fn analysis(response: &AnalysisResponse) -> String {
    format!("{}\n", response.result.trim_end())
}

pub fn llm_status(status: &LlmStatus) -> String {
    let mut out = format!("llm: {}", status.status);
    if let Some(model) = &status.model {
        let _ = write!(out, " ({model})");
    }
    if let Some(error) = &status.error {
        let _ = write!(out, " - {error}");
    }
    out.push('\n');
    out
}

pub fn models(models: &ModelList) -> String {
    let mut out = String::new();
    for model in &models.models {
        let marker = if model.id == models.current_model {
            "*"
        } else {
            " "
        };
        let _ = writeln!(out, "{marker} {:<24} {} [{}]", model.id, model.name, model.kind);
    }
    out
}

pub fn sessions(sessions: &[ChatSession]) -> String {
    if sessions.is_empty() {
        return "No stored sessions.\n".to_string();
    }
    let mut out = String::new();
    for session in sessions {
        let _ = writeln!(
            out,
            "{}  {:>3} messages  updated {}",
            session.session_id,
            session.message_count,
            session.updated_at.format(TIME_FORMAT)
        );
    }
    out
}

pub fn exchanges(exchanges: &[StoredExchange]) -> String {
    let mut out = String::new();
    for exchange in exchanges {
        let _ = writeln!(
            out,
            "[{}] #{}",
            exchange.created_at.format(TIME_FORMAT),
            exchange.id
        );
        let _ = writeln!(out, "you> {}", exchange.message);
        let _ = writeln!(out, "assistant> {}", exchange.response.trim_end());
        match exchange.feedback.and_then(docquery_core::Feedback::from_score) {
            Some(feedback) => {
                let _ = writeln!(out, "feedback: {feedback}\n");
            }
            None => out.push('\n'),
        }
    }
    out
}

pub fn stats(stats: &FeedbackStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "messages:        {}", stats.total_messages);
    let _ = writeln!(
        out,
        "positive:        {} ({:.1}%)",
        stats.positive_feedback, stats.positive_percentage
    );
    let _ = writeln!(
        out,
        "negative:        {} ({:.1}%)",
        stats.negative_feedback, stats.negative_percentage
    );
    let _ = writeln!(out, "no feedback:     {}", stats.no_feedback);
    let _ = writeln!(out, "average rating:  {:.2}", stats.average_rating);
    let _ = writeln!(out, "feedback rate:   {:.1}%", stats.feedback_rate);
    out
}

pub fn trends(trends: &[FeedbackTrend]) -> String {
    let mut out = String::new();
    for day in trends {
        let _ = writeln!(
            out,
            "{}  +{:<4} -{:<4} total {}",
            day.date, day.positive, day.negative, day.total
        );
    }
    out
}

pub fn upload_receipt(receipt: &UploadReceipt) -> String {
    format!("uploaded {} as document {}\n", receipt.filename, receipt.document_id)
}

pub fn uploads(rows: &[UploadRowView]) -> String {
    let mut out = String::new();
    for row in rows {
        let stage = match &row.stage {
            UploadStage::Uploading { progress } => format!("uploading {progress}%"),
            UploadStage::Uploaded { document_id } => format!("uploaded as document {document_id}"),
            UploadStage::Processing { document_id } => format!("processing document {document_id}"),
            UploadStage::Processed { document_id } => format!("processed document {document_id}"),
            UploadStage::Error(error) => format!("error: {error}"),
        };
        let _ = writeln!(
            out,
            "{:>3}  {:<28} {:>9}  {}",
            row.upload_id,
            row.name,
            format_size(row.size),
            stage
        );
    }
    out
}

pub fn citations(citations: &[Citation]) -> String {
    let mut out = String::new();
    for (index, citation) in citations.iter().enumerate() {
        let location = match citation.page_number {
            Some(page) => format!("page {page}"),
            None => format!("chunk {}", citation.chunk_index),
        };
        let _ = writeln!(
            out,
            "  [{}] {}, {}, {}% relevant",
            index + 1,
            citation.filename,
            location,
            citation.relevance_percent()
        );
    }
    out
}

pub fn message(message: &Message) -> String {
    let mut out = match message.role {
        Role::User => format!("you> {}\n", message.content),
        Role::Assistant => format!("assistant> {}\n", message.content.trim_end()),
    };
    out.push_str(&citations(&message.citations));
    if let Some(id) = message.message_id {
        let _ = match message.feedback {
            Some(feedback) => writeln!(out, "  #{id} rated {feedback}"),
            None => writeln!(out, "  #{id}  /good {id}  /bad {id}"),
        };
    }
    out
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes} B")
    } else if value < KB * KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / (KB * KB))
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Incremental writer for the chat transcript. Prints messages once, and the
/// in-flight answer as it grows.
#[derive(Debug, Default)]
pub struct ChatPrinter {
    shown: usize,
    streamed: String,
    notice: Option<String>,
}

impl ChatPrinter {
    /// Forget what was printed, e.g. after the conversation was replaced.
    pub fn reset(&mut self) {
        self.shown = 0;
        self.streamed.clear();
    }

    /// Marks the first `count` messages as already visible.
    pub fn skip_to(&mut self, count: usize) {
        self.shown = count;
    }

    pub fn render(&mut self, view: &AppViewModel, out: &mut impl Write) -> io::Result<()> {
        if let Some(text) = &view.streaming_text {
            self.print_stream(text, out)?;
        }
        if view.messages.len() < self.shown {
            self.shown = view.messages.len();
        }
        for message in &view.messages[self.shown..] {
            if message.role == Role::Assistant && !self.streamed.is_empty() {
                self.print_stream(&message.content, out)?;
                writeln!(out)?;
                write!(out, "{}", citations(&message.citations))?;
                if let Some(id) = message.message_id {
                    writeln!(out, "  #{id}  /good {id}  /bad {id}")?;
                }
                self.streamed.clear();
            } else {
                write!(out, "{}", self::message(message))?;
            }
        }
        self.shown = view.messages.len();
        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                writeln!(out, "! {notice}")?;
            }
            self.notice = view.notice.clone();
        }
        out.flush()
    }

    fn print_stream(&mut self, text: &str, out: &mut impl Write) -> io::Result<()> {
        if self.streamed.is_empty() {
            write!(out, "assistant> {text}")?;
        } else if let Some(rest) = text.strip_prefix(self.streamed.as_str()) {
            write!(out, "{rest}")?;
        } else {
            // The final answer replaced the streamed fragments.
            write!(out, "\nassistant> {text}")?;
        }
        self.streamed = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use docquery_core::{ChatPhase, Feedback};
    use pretty_assertions::assert_eq;

    fn assistant(content: &str) -> Message {
        Message {
            id: 2,
            content: content.to_string(),
            role: Role::Assistant,
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            citations: Vec::new(),
            feedback: Some(Feedback::Negative),
            message_id: Some(31),
        }
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
    }

    #[test]
    fn rated_message_shows_its_feedback() {
        assert_eq!(
            message(&assistant("Done.")),
            "assistant> Done.\n  #31 rated negative\n"
        );
    }

    #[test]
    fn printer_streams_deltas_then_finishes_line() {
        let mut printer = ChatPrinter::default();
        let mut out = Vec::new();

        let mut view = AppViewModel {
            phase: ChatPhase::Streaming,
            streaming_text: Some("Hel".to_string()),
            ..AppViewModel::default()
        };
        printer.render(&view, &mut out).unwrap();
        view.streaming_text = Some("Hello".to_string());
        printer.render(&view, &mut out).unwrap();

        let mut done = assistant("Hello");
        done.feedback = None;
        view.phase = ChatPhase::Idle;
        view.streaming_text = None;
        view.messages = vec![done];
        printer.render(&view, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "assistant> Hello\n  #31  /good 31  /bad 31\n"
        );
    }

    #[test]
    fn replaced_stream_is_reprinted() {
        let mut printer = ChatPrinter::default();
        let mut out = Vec::new();
        let view = AppViewModel {
            streaming_text: Some("draft".to_string()),
            ..AppViewModel::default()
        };
        printer.render(&view, &mut out).unwrap();
        let mut final_answer = assistant("Final");
        final_answer.message_id = None;
        let view = AppViewModel {
            messages: vec![final_answer],
            ..AppViewModel::default()
        };
        printer.render(&view, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "assistant> draft\nassistant> Final\n"
        );
    }
}
