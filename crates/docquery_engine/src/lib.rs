//! Doc Query engine: HTTP client, stream decoding, exports and the
//! background request runner.
mod client;
mod config;
mod engine;
mod error;
mod export;
mod persist;
mod sse;
mod types;

pub use client::{ApiClient, DocQueryApi};
pub use config::{normalize_base_url, ClientConfig, DEFAULT_BASE_URL};
pub use engine::{EngineEvent, EngineHandle};
pub use error::{ApiError, ApiResponse, UNKNOWN_ERROR};
pub use export::{
    csv_field, export_filename, render_export, write_export, ConversationExport, ExportError,
    ExportFormat, ExportSummary,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sse::SseDecoder;
pub use types::{
    AckResponse, AnalysisRequest, AnalysisResponse, AnalysisType, ChatRequest, ChunkKey,
    DetailedHealth, DocumentChunk, DocumentList, FeedbackRequest, FeedbackStats, FeedbackTrend,
    HealthConfig, HealthStatus, LlmStatus, ModelInfo, ModelList, ProcessReceipt, QueryRequest,
    QueryResponse, SearchHit, SearchRequest, UploadReceipt,
};
