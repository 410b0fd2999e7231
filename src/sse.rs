//! Server-sent event decoding for streamed chat completions.
//!
//! The body of a streamed response is a sequence of `\n`-terminated lines.
//! Lines of the form `data: <json>` carry a [`ChatCompletionChunk`]; every
//! other line (blank separators, `event:` or `id:` fields, comments) is
//! skipped.  Bytes are buffered until a whole line is available, so frames
//! split across network reads are reassembled before they are parsed.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::observability::{STREAM_BYTES, STREAM_FRAMES, STREAM_SOFT_ENDS};
use crate::render::Renderer;
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Payload OpenAI sends after the last real frame.
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A `data:` line carrying a completion chunk.
    Chunk(ChatCompletionChunk),

    /// The `data: [DONE]` sentinel.
    Done,
}

/// Process a stream of bytes into a stream of frames.
///
/// A read error ends the frame stream quietly, the same way EOF does: the
/// caller keeps whatever it accumulated so far.  Malformed `data:` payloads
/// are yielded as errors.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<Frame>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    stream::unfold(
        (byte_stream, Vec::new(), false),
        |(mut stream, mut buffer, mut eof)| async move {
            loop {
                // First drain complete lines already in the buffer
                while let Some(line) = take_line(&mut buffer, eof) {
                    if let Some(frame) = parse_line(&line) {
                        return Some((frame, (stream, buffer, eof)));
                    }
                }
                if eof {
                    return None;
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(err)) => {
                        STREAM_SOFT_ENDS.click();
                        tracing::warn!(error = %err, "stream read failed; treating as end of reply");
                        buffer.clear();
                        eof = true;
                    }
                    None => {
                        eof = true;
                    }
                }
            }
        },
    )
}

/// Remove the next line from `buffer`.
///
/// Without a newline in the buffer a line is only returned at EOF, when the
/// unterminated tail is all that is left.
fn take_line(buffer: &mut Vec<u8>, eof: bool) -> Option<Vec<u8>> {
    let mut line = match buffer.iter().position(|b| *b == b'\n') {
        Some(idx) => {
            let mut line: Vec<u8> = buffer.drain(..=idx).collect();
            line.pop();
            line
        }
        None if eof && !buffer.is_empty() => std::mem::take(buffer),
        None => return None,
    };
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Parse one line; `None` means the line is not a data frame.
///
/// Only the payload of a data line has to be UTF-8.
fn parse_line(line: &[u8]) -> Option<Result<Frame>> {
    let payload = line.strip_prefix(b"data:")?;
    let payload = match std::str::from_utf8(payload) {
        Ok(payload) => payload.trim(),
        Err(err) => return Some(Err(err.into())),
    };
    if payload == DONE_SENTINEL {
        return Some(Ok(Frame::Done));
    }
    Some(
        serde_json::from_str::<ChatCompletionChunk>(payload)
            .map(Frame::Chunk)
            .map_err(|err| {
                Error::streaming(
                    format!("failed to parse stream frame {payload:?}: {err}"),
                    Some(Box::new(err)),
                )
            }),
    )
}

/// Drive a streamed reply to completion.
///
/// Each non-empty content fragment is handed to the renderer as soon as its
/// frame is decoded and appended to the returned reply.  Decoding stops at
/// the first frame whose finish reason is `stop`, at the `[DONE]` sentinel,
/// or when the body ends.
///
/// # Errors
///
/// Fails on a malformed frame or a frame without choices.  Cancelling
/// `cancel` aborts at once, even while waiting on a stalled connection.
pub async fn decode_stream<S>(
    byte_stream: S,
    renderer: &mut dyn Renderer,
    cancel: &CancellationToken,
) -> Result<String>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut frames = Box::pin(process_sse(byte_stream));
    let mut reply = String::new();
    let mut frame_count = 0usize;

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                renderer.print_interrupted();
                return Err(Error::abort("reply interrupted by user"));
            }
            frame = frames.next() => frame,
        };
        let Some(frame) = frame else {
            break;
        };
        let chunk = match frame? {
            Frame::Chunk(chunk) => chunk,
            Frame::Done => break,
        };
        STREAM_FRAMES.click();
        frame_count += 1;

        let choice = chunk.first_choice()?;
        if let Some(content) = choice.content() {
            renderer.print_text(content);
            reply.push_str(content);
        }
        if choice.is_stop() {
            break;
        }
    }

    tracing::debug!(frames = frame_count, bytes = reply.len(), "stream decoded");
    renderer.finish_response();
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::render::RecordingRenderer;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes>> + Unpin + use<> {
        let parts: Vec<Result<Bytes>> = parts
            .iter()
            .map(|part| Ok(Bytes::from(part.to_string())))
            .collect();
        stream::iter(parts)
    }

    fn delta(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}},\"finish_reason\":null}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    const STOP: &str = "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n";

    async fn decode(parts: &[&str]) -> (Result<String>, RecordingRenderer) {
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();
        let result = decode_stream(chunks(parts), &mut renderer, &cancel).await;
        (result, renderer)
    }

    #[tokio::test]
    async fn reply_is_concatenation_up_to_stop() {
        let hi = delta("Hi ");
        let there = delta("there!");
        let after = delta("never shown");
        let (reply, renderer) = decode(&[hi.as_str(), there.as_str(), STOP, after.as_str()]).await;
        assert_eq!(reply.unwrap(), "Hi there!");
        assert_eq!(renderer.text, "Hi there!");
        assert_eq!(renderer.finished, 1);
    }

    #[tokio::test]
    async fn content_on_the_stop_frame_is_kept() {
        let last = "data: {\"choices\":[{\"delta\":{\"content\":\"end.\"},\"finish_reason\":\"stop\"}]}\n";
        let start = delta("The ");
        let (reply, _) = decode(&[start.as_str(), last]).await;
        assert_eq!(reply.unwrap(), "The end.");
    }

    #[tokio::test]
    async fn eof_without_stop_returns_partial_reply() {
        let a = delta("partial ");
        let b = delta("reply");
        let (reply, renderer) = decode(&[a.as_str(), b.as_str()]).await;
        assert_eq!(reply.unwrap(), "partial reply");
        assert_eq!(renderer.finished, 1);
    }

    #[tokio::test]
    async fn frame_split_across_reads() {
        let whole = delta("split");
        let (head, tail) = whole.split_at(17);
        let (reply, _) = decode(&[head, tail, STOP]).await;
        assert_eq!(reply.unwrap(), "split");
    }

    #[tokio::test]
    async fn multibyte_character_split_across_reads() {
        let frame = delta("héllo");
        let bytes = frame.as_bytes();
        let cut = frame.find('é').unwrap() + 1;
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
        ];
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();
        let reply = decode_stream(stream::iter(parts), &mut renderer, &cancel).await;
        assert_eq!(reply.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn non_data_lines_are_skipped() {
        let frame = delta("ok");
        let (reply, _) = decode(&[": keep-alive\n", "event: message\n", "\n", frame.as_str(), STOP]).await;
        assert_eq!(reply.unwrap(), "ok");
    }

    #[tokio::test]
    async fn non_data_line_with_invalid_utf8_is_skipped() {
        let frame = delta("ok");
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b": comment \xff\xfe\n\n")),
            Ok(Bytes::from(frame)),
            Ok(Bytes::from_static(STOP.as_bytes())),
        ];
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();
        let reply = decode_stream(stream::iter(parts), &mut renderer, &cancel).await;
        assert_eq!(reply.unwrap(), "ok");
    }

    #[tokio::test]
    async fn invalid_utf8_in_data_payload_is_fatal() {
        let parts: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"data: {\"x\":\"\xff\"}\n\n"))];
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();
        let reply = decode_stream(stream::iter(parts), &mut renderer, &cancel).await;
        assert!(reply.unwrap_err().is_decode());
    }

    #[tokio::test]
    async fn crlf_line_endings() {
        let frame = delta("crlf").replace("\n\n", "\r\n\r\n");
        let (reply, _) = decode(&[frame.as_str(), STOP]).await;
        assert_eq!(reply.unwrap(), "crlf");
    }

    #[tokio::test]
    async fn done_sentinel_ends_reply() {
        let frame = delta("cut short");
        let length = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"length\"}]}\n\n";
        let (reply, _) = decode(&[frame.as_str(), length, "data: [DONE]\n\n"]).await;
        assert_eq!(reply.unwrap(), "cut short");
    }

    #[tokio::test]
    async fn unterminated_final_line_is_decoded() {
        let frame = delta("tail");
        let trimmed = frame.trim_end();
        let (reply, _) = decode(&[trimmed]).await;
        assert_eq!(reply.unwrap(), "tail");
    }

    #[tokio::test]
    async fn malformed_frame_is_fatal() {
        let good = delta("before");
        let (reply, _) = decode(&[good.as_str(), "data: {not json}\n\n"]).await;
        let err = reply.unwrap_err();
        assert!(err.is_decode(), "{err}");
    }

    #[tokio::test]
    async fn empty_choices_is_fatal() {
        let (reply, renderer) = decode(&["data: {\"choices\":[]}\n\n"]).await;
        assert!(reply.unwrap_err().is_decode());
        assert!(renderer.text.is_empty());
    }

    #[tokio::test]
    async fn read_error_is_a_soft_end() {
        let first = delta("kept");
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from(first)),
            Ok(Bytes::from_static(b"data: {\"choi")),
            Err(Error::connection("connection reset", None)),
            Ok(Bytes::from(delta("lost"))),
        ];
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();
        let reply = decode_stream(stream::iter(parts), &mut renderer, &cancel).await;
        assert_eq!(reply.unwrap(), "kept");
    }

    #[tokio::test]
    async fn interrupt_aborts_between_frames() {
        let frame = delta("ignored");
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = decode_stream(chunks(&[frame.as_str(), STOP]), &mut renderer, &cancel).await;
        assert!(result.unwrap_err().is_abort());
        assert!(renderer.interrupted);
        assert!(renderer.text.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_aborts_a_stalled_stream() {
        let first = delta("partial");
        let stalled = stream::iter(vec![Ok(Bytes::from(first))]).chain(stream::pending());
        let mut renderer = RecordingRenderer::default();
        let cancel = CancellationToken::new();

        let decode = decode_stream(stalled, &mut renderer, &cancel);
        let press = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(decode, press)
        })
        .await
        .expect("decoding should stop once interrupted");

        assert!(result.unwrap_err().is_abort());
        assert!(renderer.interrupted);
        assert_eq!(renderer.text, "partial");
    }

    #[tokio::test]
    async fn frames_stream_yields_chunks_then_done() {
        let frame = delta("x");
        let frames: Vec<Result<Frame>> =
            process_sse(chunks(&[frame.as_str(), "data: [DONE]\n"])).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Ok(Frame::Chunk(_))));
        assert!(matches!(frames[1], Ok(Frame::Done)));
    }
}
