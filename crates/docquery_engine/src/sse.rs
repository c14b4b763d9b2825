use docquery_core::StreamEvent;
use docquery_logging::{dq_debug, dq_trace, dq_warn};
use encoding_rs::{CoderResult, Decoder, UTF_8};

const DATA_PREFIX: &str = "data: ";

/// Incremental decoder for `data: <json>` server-sent-event frames.
///
/// Bytes are decoded as UTF-8 with a streaming decoder, so a multi-byte
/// character split across two chunks is reassembled instead of replaced.
/// Only complete (newline-terminated) lines are parsed; the trailing partial
/// line waits for the next chunk.
pub struct SseDecoder {
    decoder: Decoder,
    buffer: String,
    malformed: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder_without_bom_handling(),
            buffer: String::new(),
            malformed: 0,
        }
    }

    /// Feeds one chunk of body bytes and returns every event completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.decode(bytes);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .lines()
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    /// Ends the stream. An unterminated trailing line is discarded; returns
    /// its length in bytes.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 {
            dq_debug!("Discarding {} bytes of unterminated stream data", dropped);
        }
        self.buffer.clear();
        self.decoder = UTF_8.new_decoder_without_bom_handling();
        dropped
    }

    /// Number of `data:` lines skipped because their JSON did not parse.
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    fn decode(&mut self, mut input: &[u8]) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len() * 3 + 4);
            self.buffer.reserve(needed);
            let (result, read, _had_errors) =
                self.decoder.decode_to_string(input, &mut self.buffer, false);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<StreamEvent> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => {
                dq_trace!("Stream event {:?}", event);
                Some(event)
            }
            Err(err) => {
                self.malformed += 1;
                dq_warn!("Skipping malformed stream frame ({}): {}", err, payload);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_line_waits_for_newline() {
        let mut decoder = SseDecoder::new();
        assert!(decoder
            .push(br#"data: {"type":"content","con"#)
            .is_empty());
        let events = decoder.push(b"tent\":\"x\"}\n\n");
        assert_eq!(
            events,
            vec![StreamEvent::Content {
                content: "x".to_string()
            }]
        );
    }

    #[test]
    fn crlf_terminated_lines_parse() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"type\":\"content\",\"content\":\"a\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 3\n\n");
        assert!(events.is_empty());
        assert_eq!(decoder.malformed_count(), 0);
    }

    #[test]
    fn finish_discards_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(br#"data: {"type":"content","content":"late"}"#);
        assert!(events.is_empty());
        assert_eq!(decoder.finish(), 41);
    }
}
