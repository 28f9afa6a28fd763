//! Incremental server-sent events decoding
//!
//! Response bodies arrive in arbitrary chunks; a frame may be split across
//! several of them. [`SseDecoder`] buffers bytes until a blank line closes a
//! frame, and [`decode_events`] turns the frames of a body into
//! [`PipelineEvent`]s.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use itinera_core::domain::event::PipelineEvent;
use std::collections::VecDeque;

use crate::error::{ClientError, Result};

/// Stream of events decoded from one run's response body
pub type EventStream = BoxStream<'static, Result<PipelineEvent>>;

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk and return every frame it completed
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, consumed)) = find_frame_end(&self.buf) {
            let frame = parse_frame(&self.buf[..end]);
            self.buf.drain(..consumed);
            frames.extend(frame);
        }
        frames
    }

    /// Flush a final frame the server closed without a blank line
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_frame(&rest)
    }
}

/// Locate the first blank line; returns the frame length and the bytes to consume
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if byte != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some((line_start, i + 1));
        }
        line_start = i + 1;
    }
    None
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data_lines = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// Decode a chunked body into pipeline events
///
/// Frames without an event name (keep-alives, bare data) are skipped. A
/// transport error is yielded once and ends the stream.
pub fn decode_events<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let reader = FrameReader {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_event().await?;
        Some((item, reader))
    })
    .boxed()
}

struct FrameReader<S> {
    body: std::pin::Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    finished: bool,
}

impl<S, B, E> FrameReader<S>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    async fn next_event(&mut self) -> Option<Result<PipelineEvent>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                let Some(name) = frame.event else {
                    tracing::trace!("Skipping unnamed frame");
                    continue;
                };
                return Some(PipelineEvent::from_wire(&name, &frame.data).map_err(Into::into));
            }
            if self.finished {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = self.decoder.push_chunk(chunk.as_ref());
                    self.pending.extend(frames);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunks(parts: &[&str]) -> stream::Iter<std::vec::IntoIter<Result<Vec<u8>>>> {
        let items: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(items)
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"event: agent_started\ndata: {\"ag").is_empty());

        let frames = decoder.push_chunk(b"ent\":\"Planner\",\"step\":3}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("agent_started".to_string()),
                data: r#"{"agent":"Planner","step":3}"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_crlf_frames_and_comments() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(
            b": keep-alive\r\n\r\nevent: error\r\ndata: {\"message\":\"boom\"}\r\n\r\n",
        );
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("error"));
        assert_eq!(frames[0].data, r#"{"message":"boom"}"#);
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(b"data: first\ndata: second\n\n");
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"event: workflow_completed\ndata: {}").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event.as_deref(), Some("workflow_completed"));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_decode_events_from_chunked_body() {
        let run_id = Uuid::new_v4();
        let started = format!("event: workflow_started\ndata: {{\"workflow_id\":\"{run_id}\"}}\n\n");

        let events: Vec<_> = decode_events(chunks(&[
            &started,
            ": ping\n\n",
            "event: agent_started\ndata: {\"agent\":\"Researcher\",",
            "\"step\":1}\n\nevent: workflow_completed\n",
            "data: {\"final_output\":\"Plan\"}\n\n",
        ]))
        .collect()
        .await;

        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                PipelineEvent::RunStarted { run_id },
                PipelineEvent::StageStarted {
                    stage_name: "Researcher".to_string(),
                    step: 1,
                },
                PipelineEvent::RunCompleted {
                    final_output: "Plan".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_events_reports_bad_payload() {
        let mut events = decode_events(chunks(&["event: agent_completed\ndata: {}\n\n"]));
        let first = events.next().await.unwrap();
        assert!(matches!(first, Err(ClientError::StreamDecode(_))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let body = stream::iter(vec![
            Ok(&b"event: error\ndata: {\"message\":\"late\"}\n\n"[..]),
            Err(ClientError::ParseError("connection reset".to_string())),
            Ok(&b"event: error\ndata: {\"message\":\"never\"}\n\n"[..]),
        ]);

        let events: Vec<_> = decode_events(body).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Ok(PipelineEvent::RunFailed { message }) if message == "late"
        ));
        assert!(matches!(events[1], Err(ClientError::ParseError(_))));
    }
}
