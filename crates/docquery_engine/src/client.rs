use std::path::Path;

use bytes::Bytes;
use docquery_core::{
    validate_upload, BackendMessageId, ChatReply, ChatSession, DocumentId, Feedback, FileKind,
    StoredExchange, StreamEvent,
};
use docquery_logging::{dq_debug, dq_info, dq_warn};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{multipart, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::sse::SseDecoder;
use crate::{
    AckResponse, AnalysisRequest, AnalysisResponse, ApiError, ChatRequest, ClientConfig,
    DetailedHealth, DocumentChunk, DocumentList, FeedbackRequest, FeedbackStats, FeedbackTrend,
    HealthStatus, LlmStatus, ModelList, ProcessReceipt, QueryRequest, QueryResponse, SearchHit,
    SearchRequest, UploadReceipt,
};

const JSON: &str = "application/json";

/// Operations the engine thread drives. Implemented by [`ApiClient`]; tests
/// substitute their own backend.
#[async_trait::async_trait]
pub trait DocQueryApi: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;

    async fn send_chat_stream(
        &self,
        request: &ChatRequest,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<usize, ApiError>;

    async fn submit_feedback(
        &self,
        message_id: BackendMessageId,
        feedback: Feedback,
    ) -> Result<AckResponse, ApiError>;

    async fn list_sessions(&self) -> Result<Vec<ChatSession>, ApiError>;

    async fn session_messages(&self, session_id: &str) -> Result<Vec<StoredExchange>, ApiError>;

    async fn list_documents(&self) -> Result<DocumentList, ApiError>;

    async fn process_document(&self, document_id: DocumentId) -> Result<ProcessReceipt, ApiError>;

    async fn delete_document(&self, document_id: DocumentId) -> Result<AckResponse, ApiError>;

    async fn upload_document(
        &self,
        path: &Path,
        name: &str,
        kind: FileKind,
    ) -> Result<UploadReceipt, ApiError>;
}

/// Chunk and search listings come either bare or wrapped in an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "chunks", alias = "results")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ApiError::network)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.fetch(self.json_request(Method::GET, "health")?).await
    }

    pub async fn health_detailed(&self) -> Result<DetailedHealth, ApiError> {
        self.fetch(self.json_request(Method::GET, "health/detailed")?)
            .await
    }

    pub async fn list_documents(&self) -> Result<DocumentList, ApiError> {
        self.fetch(self.json_request(Method::GET, "documents/")?)
            .await
    }

    pub async fn get_document(
        &self,
        document_id: DocumentId,
    ) -> Result<docquery_core::Document, ApiError> {
        self.fetch(self.json_request(Method::GET, &format!("documents/{document_id}"))?)
            .await
    }

    pub async fn delete_document(&self, document_id: DocumentId) -> Result<AckResponse, ApiError> {
        self.fetch(self.json_request(Method::DELETE, &format!("documents/{document_id}"))?)
            .await
    }

    pub async fn process_document(
        &self,
        document_id: DocumentId,
    ) -> Result<ProcessReceipt, ApiError> {
        self.fetch(self.json_request(Method::POST, &format!("documents/{document_id}/process"))?)
            .await
    }

    pub async fn document_chunks(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentChunk>, ApiError> {
        let listing: Listing<DocumentChunk> = self
            .fetch(self.json_request(Method::GET, &format!("documents/{document_id}/chunks"))?)
            .await?;
        Ok(listing.into_vec())
    }

    pub async fn search_documents(
        &self,
        query: &str,
        n_results: u32,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let body = SearchRequest {
            query: query.to_string(),
            n_results,
        };
        let listing: Listing<SearchHit> = self
            .fetch(self.json_body(Method::POST, "documents/search", &body)?)
            .await?;
        Ok(listing.into_vec())
    }

    /// Validates the file client-side, then uploads it as multipart form
    /// data under the field `file`.
    pub async fn upload_path(&self, path: &Path) -> Result<UploadReceipt, ApiError> {
        let io_err = |err: std::io::Error| ApiError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        };
        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let kind = validate_upload(&name, None, metadata.len())?;
        self.upload_document(path, &name, kind).await
    }

    pub async fn upload_document(
        &self,
        path: &Path,
        name: &str,
        kind: FileKind,
    ) -> Result<UploadReceipt, ApiError> {
        let contents = tokio::fs::read(path).await.map_err(|err| ApiError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        dq_info!("Uploading {} ({} bytes, {})", name, contents.len(), kind.mime_type());

        let part = multipart::Part::bytes(contents)
            .file_name(name.to_string())
            .mime_str(kind.mime_type())
            .map_err(ApiError::network)?;
        let form = multipart::Form::new().part("file", part);
        // No explicit content type: reqwest sets the multipart boundary.
        let request = self
            .http
            .post(self.config.endpoint("documents/upload")?)
            .multipart(form);
        self.fetch(self.with_timeout(request)).await
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        self.fetch(self.json_body(Method::POST, "llm/query", request)?)
            .await
    }

    /// Streams a RAG answer, invoking `on_event` once per frame in order.
    /// Returns the number of events delivered.
    pub async fn query_stream<F>(
        &self,
        request: &QueryRequest,
        on_event: F,
    ) -> Result<usize, ApiError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        self.stream("llm/query/stream", request, on_event).await
    }

    pub async fn analyze_document(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, ApiError> {
        self.fetch(self.json_body(Method::POST, "llm/analyze", request)?)
            .await
    }

    pub async fn llm_status(&self) -> Result<LlmStatus, ApiError> {
        self.fetch(self.json_request(Method::GET, "llm/status")?)
            .await
    }

    pub async fn list_models(&self) -> Result<ModelList, ApiError> {
        self.fetch(self.json_request(Method::GET, "llm/models")?)
            .await
    }

    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, ApiError> {
        self.fetch(self.json_request(Method::GET, "chat/sessions")?)
            .await
    }

    pub async fn session_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<StoredExchange>, ApiError> {
        let path = format!("chat/sessions/{}/messages", encode_segment(session_id));
        self.fetch(self.json_request(Method::GET, &path)?).await
    }

    pub async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        self.fetch(self.json_body(Method::POST, "chat/send", request)?)
            .await
    }

    pub async fn send_chat_stream<F>(
        &self,
        request: &ChatRequest,
        on_event: F,
    ) -> Result<usize, ApiError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        self.stream("chat/send/stream", request, on_event).await
    }

    pub async fn submit_feedback(
        &self,
        message_id: BackendMessageId,
        feedback: Feedback,
    ) -> Result<AckResponse, ApiError> {
        let path = format!("chat/messages/{message_id}/feedback");
        self.fetch(self.json_body(Method::POST, &path, &FeedbackRequest { feedback })?)
            .await
    }

    pub async fn feedback_stats(&self) -> Result<FeedbackStats, ApiError> {
        self.fetch(self.json_request(Method::GET, "chat/feedback/stats")?)
            .await
    }

    pub async fn feedback_trends(&self, days: u32) -> Result<Vec<FeedbackTrend>, ApiError> {
        let mut url = self.config.endpoint("chat/feedback/trends")?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        let request = self.http.get(url).header(CONTENT_TYPE, JSON);
        self.fetch(self.with_timeout(request)).await
    }

    fn json_request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let request = self
            .http
            .request(method, self.config.endpoint(path)?)
            .header(CONTENT_TYPE, JSON);
        Ok(self.with_timeout(request))
    }

    fn json_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<RequestBuilder, ApiError> {
        let payload =
            serde_json::to_vec(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        Ok(self.json_request(method, path)?.body(payload))
    }

    fn with_timeout(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Sends one request and decodes a 2xx JSON body.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(ApiError::network)?;
        let status = response.status();
        if !status.is_success() {
            dq_debug!("{} answered {}", response.url(), status);
            return Err(ApiError::HttpStatus(status.as_u16()));
        }
        let body: Bytes = response.bytes().await.map_err(ApiError::network)?;
        serde_json::from_slice(&body).map_err(|err| {
            dq_warn!("Undecodable response body: {}", err);
            ApiError::Decode(err.to_string())
        })
    }

    async fn stream<B, F>(&self, path: &str, body: &B, mut on_event: F) -> Result<usize, ApiError>
    where
        B: Serialize + ?Sized,
        F: FnMut(StreamEvent) + Send,
    {
        let request = self
            .json_body(Method::POST, path, body)?
            .header(ACCEPT, "text/event-stream");
        let response = request.send().await.map_err(ApiError::network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status.as_u16()));
        }
        if status == StatusCode::NO_CONTENT {
            return Err(ApiError::NoBody);
        }

        let mut decoder = SseDecoder::new();
        let mut delivered = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ApiError::network)?;
            for event in decoder.push(&chunk) {
                on_event(event);
                delivered += 1;
            }
        }
        decoder.finish();
        dq_debug!(
            "Stream {} closed after {} events ({} malformed)",
            path,
            delivered,
            decoder.malformed_count()
        );
        Ok(delivered)
    }
}

#[async_trait::async_trait]
impl DocQueryApi for ApiClient {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        ApiClient::send_chat(self, request).await
    }

    async fn send_chat_stream(
        &self,
        request: &ChatRequest,
        on_event: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<usize, ApiError> {
        ApiClient::send_chat_stream(self, request, on_event).await
    }

    async fn submit_feedback(
        &self,
        message_id: BackendMessageId,
        feedback: Feedback,
    ) -> Result<AckResponse, ApiError> {
        ApiClient::submit_feedback(self, message_id, feedback).await
    }

    async fn list_sessions(&self) -> Result<Vec<ChatSession>, ApiError> {
        ApiClient::list_sessions(self).await
    }

    async fn session_messages(&self, session_id: &str) -> Result<Vec<StoredExchange>, ApiError> {
        ApiClient::session_messages(self, session_id).await
    }

    async fn list_documents(&self) -> Result<DocumentList, ApiError> {
        ApiClient::list_documents(self).await
    }

    async fn process_document(&self, document_id: DocumentId) -> Result<ProcessReceipt, ApiError> {
        ApiClient::process_document(self, document_id).await
    }

    async fn delete_document(&self, document_id: DocumentId) -> Result<AckResponse, ApiError> {
        ApiClient::delete_document(self, document_id).await
    }

    async fn upload_document(
        &self,
        path: &Path,
        name: &str,
        kind: FileKind,
    ) -> Result<UploadReceipt, ApiError> {
        ApiClient::upload_document(self, path, name, kind).await
    }
}

/// Percent-encodes a path segment so session ids cannot escape the route.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
