use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use docquery_core::{StreamEvent, StreamTranscript};
use docquery_engine::{ApiClient, ApiError, ChatRequest, ClientConfig, QueryRequest, SseDecoder};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    let config = ClientConfig::new(&format!("{}/api", server.uri())).unwrap();
    ApiClient::new(config).unwrap()
}

fn chat(message: &str) -> ChatRequest {
    ChatRequest {
        session_id: None,
        message: message.to_string(),
    }
}

const THREE_FRAMES: &str = concat!(
    "data: {\"type\":\"content\",\"content\":\"Hel\"}\n\n",
    "data: {\"type\":\"content\",\"content\":\"lo\"}\n\n",
    "data: {\"type\":\"complete\",\"content\":\"Hello\",\"citations\":[],",
    "\"message_id\":7,\"session_id\":\"s-1\"}\n\n",
);

#[tokio::test]
async fn chat_stream_delivers_frames_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/send/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(THREE_FRAMES, "text/event-stream"))
        .mount(&server)
        .await;

    let mut events = Vec::new();
    let delivered = client_for(&server)
        .send_chat_stream(&chat("hi"), |event| events.push(event))
        .await
        .unwrap();

    assert_eq!(delivered, 3);
    assert_eq!(
        events[0],
        StreamEvent::Content {
            content: "Hel".to_string()
        }
    );

    let mut transcript = StreamTranscript::default();
    for event in &events {
        transcript.apply(event);
    }
    assert_eq!(transcript.text(), "Hello");
    assert!(transcript.is_complete());
    assert_eq!(transcript.message_id(), Some(7));
    assert_eq!(transcript.session_id(), Some("s-1"));
}

#[tokio::test]
async fn malformed_frame_is_skipped() {
    docquery_logging::initialize_for_tests();
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"content\",\"content\":\"a\"}\n\n",
        "data: {bad}\n\n",
        "data: {\"type\":\"content\",\"content\":\"b\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/llm/query/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut texts = Vec::new();
    let delivered = client_for(&server)
        .query_stream(&QueryRequest::new("q"), |event| {
            if let StreamEvent::Content { content } = event {
                texts.push(content);
            }
        })
        .await
        .unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn failed_stream_status_emits_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/send/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut called = 0;
    let err = client_for(&server)
        .send_chat_stream(&chat("hi"), |_| called += 1)
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::HttpStatus(500));
    assert_eq!(err.to_string(), "HTTP error! status: 500");
    assert_eq!(called, 0);
}

#[tokio::test]
async fn empty_stream_response_has_no_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/send/stream"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .send_chat_stream(&chat("hi"), |_| {})
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NoBody);
    assert_eq!(err.to_string(), "No response body");
}

#[tokio::test]
async fn error_frame_replaces_partial_text() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"content\",\"content\":\"partial\"}\n\n",
        "data: {\"type\":\"error\",\"content\":\"model overloaded\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat/send/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut transcript = StreamTranscript::default();
    client_for(&server)
        .send_chat_stream(&chat("hi"), |event| transcript.apply(&event))
        .await
        .unwrap();

    assert!(transcript.is_failed());
    assert_eq!(transcript.text(), "model overloaded");
}

#[test]
fn multibyte_character_split_across_chunks() {
    let frame = "data: {\"type\":\"content\",\"content\":\"日本\"}\n\n".as_bytes();
    // Split inside the three-byte encoding of the first character.
    let split = frame.iter().position(|&b| b >= 0x80).unwrap() + 1;

    let mut decoder = SseDecoder::new();
    assert!(decoder.push(&frame[..split]).is_empty());
    let events = decoder.push(&frame[split..]);

    assert_eq!(
        events,
        vec![StreamEvent::Content {
            content: "日本".to_string()
        }]
    );
    assert_eq!(decoder.finish(), 0);
}

#[test]
fn frames_split_at_arbitrary_byte_boundaries() {
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    for chunk in THREE_FRAMES.as_bytes().chunks(5) {
        events.extend(decoder.push(chunk));
    }
    assert_eq!(events.len(), 3);
    assert_eq!(decoder.malformed_count(), 0);
}

/// Serves one request, promising a longer body than it sends before closing.
fn truncated_stream_server(frame: &'static str) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/api", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        let body_len = loop {
            let n = socket.read(&mut buf).unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let declared = text
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break end + 4 + declared;
            }
        };
        while request.len() < body_len {
            let n = socket.read(&mut buf).unwrap();
            request.extend_from_slice(&buf[..n]);
        }
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 500\r\n\r\n";
        socket.write_all(head.as_bytes()).unwrap();
        socket.write_all(frame.as_bytes()).unwrap();
        socket.flush().unwrap();
    });
    (base_url, handle)
}

#[tokio::test]
async fn connection_lost_mid_stream_is_a_network_error() {
    let (base_url, server) =
        truncated_stream_server("data: {\"type\":\"content\",\"content\":\"Hel\"}\n\n");
    let client = ApiClient::new(ClientConfig::new(&base_url).unwrap()).unwrap();

    let mut events = Vec::new();
    let result = client
        .query_stream(&QueryRequest::new("q"), |event| events.push(event))
        .await;
    server.join().unwrap();

    assert_eq!(
        events,
        vec![StreamEvent::Content {
            content: "Hel".to_string()
        }]
    );
    assert!(
        matches!(result, Err(ApiError::Network(_))),
        "unexpected result: {result:?}"
    );
}
