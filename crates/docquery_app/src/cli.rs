use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docquery_core::{BackendMessageId, DocumentId, Feedback};
use docquery_engine::{AnalysisType, ExportFormat, QueryRequest};

use crate::platform::LogDestination;

#[derive(Parser, Debug)]
#[command(
    name = "docquery",
    version,
    about = "Upload documents and ask questions about them through a Doc Query backend"
)]
pub struct Cli {
    /// Backend API root, e.g. http://localhost:8000/api
    #[arg(long, global = true, env = "DOCQUERY_BASE_URL")]
    pub base_url: Option<String>,

    /// RON config file; defaults to ./docquery.ron when present.
    #[arg(long, global = true, env = "DOCQUERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print `{success, data, error}` JSON envelopes instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true, value_enum)]
    pub log: Option<LogDestination>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the backend is up.
    Health {
        /// Include database and configuration status.
        #[arg(long)]
        detailed: bool,
    },
    /// List, upload and manage documents.
    Docs(DocsCommand),
    /// Semantic search over processed documents.
    Search {
        query: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        n_results: u32,
    },
    /// One-off question answered from the document store.
    Ask(AskArgs),
    /// Summarize a document or extract its keywords.
    Analyze {
        document_id: DocumentId,
        #[arg(value_enum)]
        kind: AnalysisKind,
        #[arg(long)]
        max_length: Option<u32>,
        #[arg(long)]
        max_keywords: Option<u32>,
    },
    /// Language model status and available models.
    Llm(LlmCommand),
    /// Stored chat sessions.
    Sessions(SessionsCommand),
    /// Rate a stored assistant answer.
    Feedback {
        message_id: BackendMessageId,
        feedback: Feedback,
    },
    /// Feedback statistics.
    Stats {
        #[arg(long)]
        trends: bool,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Write a stored session to a file.
    Export {
        session_id: String,
        #[arg(short, long, default_value = "md")]
        format: ExportFormat,
        /// Output directory; defaults to the configured export dir.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Interactive chat.
    Chat,
}

#[derive(Args, Debug)]
pub struct DocsCommand {
    #[command(subcommand)]
    pub command: DocsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DocsSubcommand {
    List,
    Show {
        document_id: DocumentId,
        /// Print the extracted text too.
        #[arg(long)]
        content: bool,
    },
    Chunks {
        document_id: DocumentId,
    },
    Delete {
        document_id: DocumentId,
    },
    Process {
        document_id: DocumentId,
    },
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Process each file right after it uploads.
        #[arg(long)]
        process: bool,
    },
}

#[derive(Args, Debug)]
pub struct AskArgs {
    pub query: String,
    #[arg(long, conflicts_with = "no_stream")]
    pub stream: bool,
    #[arg(long)]
    pub no_stream: bool,
    /// Number of context chunks to retrieve.
    #[arg(
        long,
        default_value_t = QueryRequest::DEFAULT_CONTEXT_CHUNKS,
        value_parser = clap::value_parser!(u32).range(1..=20)
    )]
    pub chunks: u32,
    #[arg(long, default_value_t = QueryRequest::DEFAULT_TEMPERATURE, value_parser = parse_temperature)]
    pub temperature: f32,
    #[arg(
        long,
        default_value_t = QueryRequest::DEFAULT_MAX_TOKENS,
        value_parser = clap::value_parser!(u32).range(100..=4000)
    )]
    pub max_tokens: u32,
    #[arg(long)]
    pub system: Option<String>,
}

impl AskArgs {
    pub fn to_request(&self) -> QueryRequest {
        QueryRequest {
            query: self.query.clone(),
            n_context_chunks: self.chunks,
            system_prompt: self.system.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Explicit flags win over the configured default.
    pub fn streaming(&self, default: bool) -> bool {
        if self.stream {
            true
        } else if self.no_stream {
            false
        } else {
            default
        }
    }
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    let value: f32 = raw.parse().map_err(|_| format!("not a number: {raw}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("temperature must be between 0.0 and 1.0, got {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalysisKind {
    Summary,
    Keywords,
}

impl From<AnalysisKind> for AnalysisType {
    fn from(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::Summary => AnalysisType::Summary,
            AnalysisKind::Keywords => AnalysisType::Keywords,
        }
    }
}

#[derive(Args, Debug)]
pub struct LlmCommand {
    #[command(subcommand)]
    pub command: LlmSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum LlmSubcommand {
    Status,
    Models,
}

#[derive(Args, Debug)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub command: SessionsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionsSubcommand {
    List,
    Show { session_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_flags_override_configured_streaming() {
        let cli = Cli::try_parse_from(["docquery", "ask", "what?", "--no-stream"]).unwrap();
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert!(!args.streaming(true));
        assert_eq!(args.to_request().n_context_chunks, 5);
    }

    #[test]
    fn ask_rejects_out_of_range_generation_settings() {
        assert!(Cli::try_parse_from(["docquery", "ask", "q", "--chunks", "0"]).is_err());
        assert!(Cli::try_parse_from(["docquery", "ask", "q", "--max-tokens", "50"]).is_err());
        assert!(Cli::try_parse_from(["docquery", "ask", "q", "--temperature", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["docquery", "ask", "q", "--temperature", "0.2"]).is_ok());
    }

    #[test]
    fn feedback_and_format_parse_from_words() {
        let cli = Cli::try_parse_from(["docquery", "feedback", "12", "good"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Feedback {
                message_id: 12,
                feedback: Feedback::Positive
            }
        ));

        let cli =
            Cli::try_parse_from(["docquery", "--json", "export", "s-1", "--format", "csv"])
                .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Export {
                format: ExportFormat::Csv,
                ..
            }
        ));
    }
}
