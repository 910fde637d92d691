//! Streaming decode engine for server-sent-event style provider output.
//!
//! Providers frame streamed completions as `data: <json>` lines terminated
//! by a sentinel. This module turns a raw byte stream into a lazy, pull-based
//! sequence of canonical [`Chunk`]s: each chunk is decoded and yielded as
//! soon as its line is complete, with no whole-response buffering. Payload
//! interpretation is supplied per provider so every adapter shares one
//! framing implementation.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// A lazy stream of canonical chunks from one provider round trip.
///
/// Dropping the stream before end-of-input is valid cancellation; the
/// underlying connection is released with it.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk>> + Send + 'static>>;

/// Stream-termination sentinel used by OpenAI-style providers.
const DONE_SENTINEL: &str = "DONE";

enum LineOutcome {
    /// Keep-alive line, comment, or empty-delta line with no event payload.
    Skip,
    /// Termination sentinel seen; the stream is over.
    Done,
    /// A fully decoded chunk.
    Chunk(Chunk),
    /// Payload decode failed; fatal to this stream iteration.
    Fail(Error),
}

struct SseState<E, F> {
    bytes: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>,
    parse: F,
    provider: String,
    model: String,
    buffer: Vec<u8>,
    done: bool,
}

/// Decode a provider byte stream into a [`ChunkStream`].
///
/// * `provider`/`model` identify the round trip in errors and logs.
/// * `parse` maps one `data:` payload (JSON text, prefix and whitespace
///   already stripped) to a [`Chunk`], failing with a chunk-decode error.
///
/// Framing rules: bytes accumulate in a byte buffer regardless of read size
/// (single-byte reads included) and are decoded as UTF-8 only once a line
/// is complete at `\n`, so multi-byte characters split across reads stay
/// intact; lines without a `data:` prefix are discarded; a payload
/// containing the `DONE` sentinel ends the stream without emitting a chunk;
/// at end-of-input a non-empty partial buffer is treated as the final line.
/// A payload decode failure is yielded as an error and ends the iteration.
pub fn sse_chunk_stream<B, E, F>(
    provider: impl Into<String>,
    model: impl Into<String>,
    bytes: B,
    parse: F,
) -> ChunkStream
where
    B: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<Chunk> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        parse,
        provider: provider.into(),
        model: model.into(),
        buffer: Vec::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            // Drain complete lines already in the buffer.
            while let Some(line_end) = state.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&line);
                match process_line(line.trim(), &state.parse) {
                    LineOutcome::Skip => continue,
                    LineOutcome::Done => {
                        tracing::debug!(provider = %state.provider, "stream terminated by sentinel");
                        return None;
                    }
                    LineOutcome::Chunk(chunk) => return Some((Ok(chunk), state)),
                    LineOutcome::Fail(err) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                }
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(Error::provider_request(state.model.clone(), e)), state));
                }
                None => {
                    // End of input: a non-empty partial buffer is the final line.
                    state.done = true;
                    if state.buffer.is_empty() {
                        return None;
                    }
                    let bytes = std::mem::take(&mut state.buffer);
                    let line = String::from_utf8_lossy(&bytes);
                    return match process_line(line.trim(), &state.parse) {
                        LineOutcome::Skip | LineOutcome::Done => None,
                        LineOutcome::Chunk(chunk) => Some((Ok(chunk), state)),
                        LineOutcome::Fail(err) => Some((Err(err), state)),
                    };
                }
            }
        }
    }))
}

fn process_line<F>(line: &str, parse: &F) -> LineOutcome
where
    F: Fn(&str) -> Result<Chunk>,
{
    let Some(payload) = line.strip_prefix("data:") else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();

    if payload.contains(DONE_SENTINEL) {
        return LineOutcome::Done;
    }

    match parse(payload) {
        Ok(chunk) => LineOutcome::Chunk(chunk),
        Err(err) => {
            tracing::warn!(error = %err, "stream chunk decode failed");
            LineOutcome::Fail(err)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, Meta};

    #[derive(serde::Deserialize)]
    struct TestPayload {
        text: String,
        #[serde(default)]
        stop: bool,
    }

    fn test_parse(payload: &str) -> Result<Chunk> {
        let parsed: TestPayload = serde_json::from_str(payload)
            .map_err(|e| Error::chunk_decode("testprov", e))?;
        Ok(Chunk {
            text: parsed.text,
            finish_reason: parsed.stop.then_some(FinishReason::Stop),
            meta: Meta::new("id", "model"),
        })
    }

    fn byte_stream(
        pieces: Vec<&str>,
    ) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send {
        let owned: Vec<std::result::Result<Bytes, std::io::Error>> = pieces
            .into_iter()
            .map(|s| Ok(Bytes::copy_from_slice(s.as_bytes())))
            .collect();
        futures::stream::iter(owned)
    }

    fn single_byte_stream(
        body: &str,
    ) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send {
        let owned: Vec<std::result::Result<Bytes, std::io::Error>> = body
            .as_bytes()
            .iter()
            .map(|&b| Ok(Bytes::copy_from_slice(&[b])))
            .collect();
        futures::stream::iter(owned)
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<Chunk>> {
        stream.collect::<Vec<_>>().await
    }

    #[tokio::test]
    async fn test_one_chunk_per_data_line_in_order() {
        let body = "data: {\"text\":\"Hel\"}\ndata: {\"text\":\"lo\"}\ndata: [DONE]\n";
        let stream = sse_chunk_stream("testprov", "m", byte_stream(vec![body]), test_parse);

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "Hel");
        assert_eq!(items[1].as_ref().unwrap().text, "lo");
    }

    #[tokio::test]
    async fn test_sentinel_emits_nothing_and_terminates() {
        let body = "data: {\"text\":\"a\"}\ndata: [DONE]\ndata: {\"text\":\"after\"}\n";
        let stream = sse_chunk_stream("testprov", "m", byte_stream(vec![body]), test_parse);

        let items = collect(stream).await;
        // Nothing after the sentinel is emitted, sentinel itself included.
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text, "a");
    }

    #[tokio::test]
    async fn test_non_data_lines_are_discarded() {
        let body = "\n: keep-alive\nevent: ping\ndata: {\"text\":\"x\"}\n\ndata: [DONE]\n";
        let stream = sse_chunk_stream("testprov", "m", byte_stream(vec![body]), test_parse);

        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text, "x");
    }

    #[tokio::test]
    async fn test_single_byte_reads_decode_identically() {
        let body = "data: {\"text\":\"Hel\"}\ndata: {\"text\":\"lo\"}\ndata: [DONE]\n";
        let stream = sse_chunk_stream("testprov", "m", single_byte_stream(body), test_parse);
        let items = collect(stream).await;

        let texts: Vec<&str> = items
            .iter()
            .map(|r| r.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_single_byte_reads_preserve_multi_byte_characters() {
        // One byte per read splits every multi-byte character across reads;
        // decoding must wait for the complete line.
        let body = "data: {\"text\":\"héllo \"}\ndata: {\"text\":\"wörld — ©\"}\ndata: [DONE]\n";
        let stream = sse_chunk_stream("testprov", "m", single_byte_stream(body), test_parse);
        let items = collect(stream).await;

        let texts: Vec<&str> = items
            .iter()
            .map(|r| r.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(texts, vec!["héllo ", "wörld — ©"]);
    }

    #[tokio::test]
    async fn test_partial_final_line_at_end_of_input() {
        // No trailing newline: the leftover buffer is the final line.
        let body = "data: {\"text\":\"a\"}\ndata: {\"text\":\"b\",\"stop\":true}";
        let stream = sse_chunk_stream("testprov", "m", byte_stream(vec![body]), test_parse);

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        let last = items[1].as_ref().unwrap();
        assert_eq!(last.text, "b");
        assert_eq!(last.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_with_chunk_decode() {
        let body = "data: {\"text\":\"ok\"}\ndata: {not json}\ndata: {\"text\":\"never\"}\n";
        let stream = sse_chunk_stream("testprov", "m", byte_stream(vec![body]), test_parse);

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "ok");
        match items[1].as_ref().unwrap_err() {
            Error::ChunkDecode { provider, .. } => assert_eq!(provider, "testprov"),
            other => panic!("expected chunk decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_as_provider_request() {
        let pieces: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\":\"a\"}\n")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        ];
        let stream = sse_chunk_stream(
            "testprov",
            "test-model",
            futures::stream::iter(pieces),
            test_parse,
        );

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        match items[1].as_ref().unwrap_err() {
            Error::ProviderRequest { model, .. } => assert_eq!(model, "test-model"),
            other => panic!("expected provider request error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_stream_yields_nothing() {
        let stream = sse_chunk_stream("testprov", "m", byte_stream(vec![]), test_parse);
        assert!(collect(stream).await.is_empty());
    }
}
