//! Request and response schemas of the Doc Query REST API.
//!
//! Every response is decoded into one of these types; a body that does not
//! match is rejected as a decode error. Unknown fields are ignored and
//! optional fields default.
use std::fmt;

use docquery_core::{Document, DocumentId, Feedback};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    pub upload_dir: String,
    pub chroma_db_path: String,
    pub openai_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedHealth {
    #[serde(flatten)]
    pub health: HealthStatus,
    pub database: String,
    pub config: HealthConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub document_id: DocumentId,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReceipt {
    pub message: String,
    pub document_id: DocumentId,
}

/// Plain acknowledgement returned by delete and feedback endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub message: String,
}

/// Chunk identifiers are numeric in practice but the store accepts strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkKey {
    Index(u64),
    Name(String),
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKey::Index(index) => write!(f, "{index}"),
            ChunkKey::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: ChunkKey,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub n_results: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub rank: u32,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub similarity_score: f64,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl SearchHit {
    pub fn filename(&self) -> &str {
        self.metadata
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub n_context_chunks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl QueryRequest {
    pub const DEFAULT_CONTEXT_CHUNKS: u32 = 5;
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 1000;

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            n_context_chunks: Self::DEFAULT_CONTEXT_CHUNKS,
            system_prompt: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub response: String,
    #[serde(default)]
    pub context_used: Vec<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Summary,
    Keywords,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub document_id: DocumentId,
    pub analysis_type: AnalysisType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_keywords: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub result: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmStatus {
    pub success: bool,
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
    pub current_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total_messages: u64,
    pub positive_feedback: u64,
    pub negative_feedback: u64,
    pub no_feedback: u64,
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub average_rating: f64,
    pub feedback_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackTrend {
    pub date: String,
    pub positive: u64,
    pub negative: u64,
    pub total: u64,
}

