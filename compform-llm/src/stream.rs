//! Server-sent event decoding for streaming completions.
//!
//! The response body arrives as arbitrary byte chunks. [`SseDecoder`] joins
//! them into lines, keeps multi-byte UTF-8 sequences split across chunks
//! intact, and turns each `data:` payload into a text delta until the
//! `[DONE]` sentinel or the end of the body.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};

use crate::error::CompletionError;
use crate::types::StreamChunk;

/// Single-pass stream of text deltas, in arrival order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    buffer: String,
    done: bool,
}

impl SseDecoder {
    /// A decoder at the start of a stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one body chunk; returns the non-empty deltas it completed.
    ///
    /// # Errors
    ///
    /// [`CompletionError::Stream`] for invalid UTF-8 or an event payload that
    /// is not a JSON chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, CompletionError> {
        if self.done {
            return Ok(Vec::new());
        }
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete trailing sequence: keep it for the next chunk.
                let tail = self.pending.split_off(e.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                self.buffer.push_str(&String::from_utf8_lossy(&head));
            }
            Err(e) => {
                return Err(CompletionError::Stream(format!("invalid UTF-8 in event stream: {e}")));
            }
        }

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, &mut deltas)?;
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(deltas)
    }

    /// Flush a final unterminated line when the body ends.
    ///
    /// # Errors
    ///
    /// As [`SseDecoder::push`], plus a dangling partial UTF-8 sequence.
    pub fn finish(&mut self) -> Result<Vec<String>, CompletionError> {
        if !self.pending.is_empty() {
            return Err(CompletionError::Stream("event stream ended inside a UTF-8 sequence".into()));
        }
        let mut deltas = Vec::new();
        let line = std::mem::take(&mut self.buffer);
        if !self.done && !line.trim().is_empty() {
            self.decode_line(&line, &mut deltas)?;
        }
        Ok(deltas)
    }

    fn decode_line(&mut self, line: &str, deltas: &mut Vec<String>) -> Result<(), CompletionError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(());
        };
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            self.done = true;
            return Ok(());
        }
        let chunk: StreamChunk = serde_json::from_str(payload)
            .map_err(|e| CompletionError::Stream(format!("malformed event payload '{payload}': {e}")))?;
        let text = chunk.delta_text();
        if !text.is_empty() {
            deltas.push(text.to_string());
        }
        Ok(())
    }
}

struct StreamState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    queue: VecDeque<String>,
    finished: bool,
}

/// Turn a byte stream into a [`DeltaStream`].
///
/// A read error or decode error is yielded once and ends the stream.
pub fn decode_byte_stream<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CompletionError> + Send + 'static,
{
    let state = StreamState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        queue: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.queue.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.finished || state.decoder.is_done() {
                return None;
            }
            let step = match state.body.next().await {
                Some(Ok(bytes)) => state.decoder.push(bytes.as_ref()),
                Some(Err(e)) => Err(e.into()),
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };
            match step {
                Ok(deltas) => state.queue.extend(deltas),
                Err(e) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
            }
        }
    }))
}

/// Decode a streaming `reqwest` response body.
pub(crate) fn from_response(response: reqwest::Response) -> DeltaStream {
    decode_byte_stream(response.bytes_stream().map(|chunk| {
        chunk.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Stream(format!("stream read error: {e}"))
            }
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n")
    }

    #[test]
    fn decodes_events_until_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}{}data: [DONE]\n\n{}", event("Hel"), event("lo"), event("ignored"));
        let deltas = decoder.push(body.as_bytes()).expect("decode");
        assert_eq!(deltas, ["Hel", "lo"]);
        assert!(decoder.is_done());
        assert!(decoder.push(event("late").as_bytes()).expect("after done").is_empty());
    }

    #[test]
    fn lines_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let body = event("abc");
        let (a, b) = body.split_at(10);
        assert!(decoder.push(a.as_bytes()).expect("first half").is_empty());
        assert_eq!(decoder.push(b.as_bytes()).expect("second half"), ["abc"]);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let body = event("héllo");
        let bytes = body.as_bytes();
        let split = body.find('é').expect("has é") + 1;
        assert!(decoder.push(&bytes[..split]).expect("first").is_empty());
        assert_eq!(decoder.push(&bytes[split..]).expect("second"), ["héllo"]);
    }

    #[test]
    fn skips_comments_empty_deltas_and_crlf() {
        let mut decoder = SseDecoder::new();
        let body = ": keep-alive\r\n\r\ndata: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\r\n\r\ndata:{\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n";
        assert_eq!(decoder.push(body.as_bytes()).expect("decode"), ["x"]);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let mut decoder = SseDecoder::new();
        let result = decoder.push(b"data: {not json}\n");
        assert!(matches!(result, Err(CompletionError::Stream(_))));
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let body = event("tail");
        let trimmed = body.trim_end();
        assert!(decoder.push(trimmed.as_bytes()).expect("push").is_empty());
        assert_eq!(decoder.finish().expect("finish"), ["tail"]);
    }

    #[tokio::test]
    async fn byte_stream_yields_deltas_then_error() {
        let chunks: Vec<Result<Vec<u8>, CompletionError>> = vec![
            Ok(event("a").into_bytes()),
            Ok(event("b").into_bytes()),
            Err(CompletionError::Stream("connection reset".into())),
            Ok(event("c").into_bytes()),
        ];
        let mut deltas = decode_byte_stream(stream::iter(chunks));
        assert_eq!(deltas.next().await.expect("a").expect("ok"), "a");
        assert_eq!(deltas.next().await.expect("b").expect("ok"), "b");
        assert!(deltas.next().await.expect("error").is_err());
        assert!(deltas.next().await.is_none());
    }

    #[tokio::test]
    async fn byte_stream_ends_on_close_without_sentinel() {
        let chunks: Vec<Result<Vec<u8>, CompletionError>> = vec![Ok(event("only").into_bytes())];
        let collected: Vec<String> = decode_byte_stream(stream::iter(chunks))
            .map(|d| d.expect("ok"))
            .collect()
            .await;
        assert_eq!(collected, ["only"]);
    }
}
