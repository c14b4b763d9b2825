//! Client-held view models. The backend owns persistence; these are caches.
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Local identifier of a message in the conversation list.
pub type MessageId = u64;

/// Backend identifier of a stored chat exchange.
pub type BackendMessageId = i64;

/// Backend identifier of an uploaded document.
pub type DocumentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    /// Backend stores feedback as `1` / `-1`; anything else means no feedback.
    pub fn from_score(score: i64) -> Option<Self> {
        match score {
            1 => Some(Feedback::Positive),
            -1 => Some(Feedback::Negative),
            _ => None,
        }
    }

    pub fn score(self) -> i64 {
        match self {
            Feedback::Positive => 1,
            Feedback::Negative => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Feedback::Positive => "positive",
            Feedback::Negative => "negative",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "good" | "up" | "+" => Ok(Feedback::Positive),
            "negative" | "bad" | "down" | "-" => Ok(Feedback::Negative),
            other => Err(format!("feedback must be 'positive' or 'negative', got '{other}'")),
        }
    }
}

fn unknown_filename() -> String {
    "Unknown".to_string()
}

/// A retrieved chunk backing an assistant answer. Read-only in the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    #[serde(default = "unknown_filename")]
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub chunk_index: u32,
    pub similarity_score: f64,
    #[serde(default)]
    pub start_position: Option<u64>,
    #[serde(default)]
    pub end_position: Option<u64>,
}

impl Citation {
    /// Similarity as a whole percentage for display.
    pub fn relevance_percent(&self) -> u32 {
        (self.similarity_score.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<BackendMessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub file_type: String,
    pub is_processed: bool,
    pub uploaded_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub message_count: u32,
}

/// One persisted exchange as the backend stores it: the user's question and
/// the assistant's answer in a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExchange {
    pub id: BackendMessageId,
    pub message: String,
    pub response: String,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub feedback: Option<i64>,
}

/// One frame of a streaming chat or query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Incremental text fragment.
    Content { content: String },
    /// Authoritative final answer; replaces every fragment seen so far.
    Complete {
        content: String,
        #[serde(default)]
        citations: Vec<Citation>,
        #[serde(default)]
        message_id: Option<BackendMessageId>,
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Backend-reported failure, sent as the last frame.
    Error {
        content: String,
        #[serde(default)]
        message_id: Option<BackendMessageId>,
        #[serde(default)]
        session_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Non-streaming chat answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub message_id: BackendMessageId,
    #[serde(default)]
    pub citations: Vec<Citation>,
}
