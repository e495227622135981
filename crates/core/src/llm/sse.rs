//! Server-sent-event plumbing shared by the streaming clients.
//!
//! Only line buffering happens here: bytes are split on `\n`, `data:` payloads are handed
//! to a provider-specific decoder, and decoded fragments are relayed over a bounded channel.

use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{NarrativeStream, Provider};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const RELAY_BUFFER: usize = 64;

/// Accumulates raw bytes and yields complete lines. A line split across chunks
/// (including inside a multi-byte character) is held until its newline arrives.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Payload of a `data:` line. Other SSE fields (`event:`, `id:`, comments) yield `None`.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Done,
    Skip,
    Error(String),
}

enum Flow {
    Continue,
    Stop,
}

/// Spawns the relay task. It stops when the decoder reports the end marker, when the
/// body ends, or as soon as the receiving side is dropped; stopping drops `body`, which
/// closes the upstream connection.
pub fn spawn_relay<S, B, E, F>(body: S, provider: Provider, decode: F) -> NarrativeStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Frame + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);

    tokio::spawn(async move {
        let mut body = std::pin::pin!(body);
        let mut lines = SseLineBuffer::default();

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!(provider = provider.as_str(), "narrative consumer gone; dropping upstream");
                    return;
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for line in lines.push(chunk.as_ref()) {
                        if let Flow::Stop = relay_line(&line, provider, &decode, &tx).await {
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    let err = anyhow::Error::new(err).context("narrative stream read failed");
                    let _ = tx.send(Err(err)).await;
                    return;
                }
                None => break,
            }
        }

        if let Some(line) = lines.finish() {
            let _ = relay_line(&line, provider, &decode, &tx).await;
        }
    });

    ReceiverStream::new(rx)
}

async fn relay_line<F>(
    line: &str,
    provider: Provider,
    decode: &F,
    tx: &mpsc::Sender<anyhow::Result<String>>,
) -> Flow
where
    F: Fn(&str) -> Frame,
{
    let Some(data) = data_payload(line) else {
        return Flow::Continue;
    };
    match decode(data) {
        Frame::Text(text) => {
            if tx.send(Ok(text)).await.is_err() {
                return Flow::Stop;
            }
            Flow::Continue
        }
        Frame::Skip => Flow::Continue,
        Frame::Done => Flow::Stop,
        Frame::Error(detail) => {
            let err = LlmDiagnosticsError::stream(provider, detail, data);
            let _ = tx.send(Err(err.into())).await;
            Flow::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn echo(data: &str) -> Frame {
        match data {
            "[DONE]" => Frame::Done,
            "" => Frame::Skip,
            d if d.starts_with("ERR") => Frame::Error(d.to_string()),
            d => Frame::Text(d.to_string()),
        }
    }

    #[test]
    fn buffers_lines_across_chunks() {
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(b"data: hel").is_empty());
        assert_eq!(buf.push(b"lo\r\ndata: x\n"), vec!["data: hello", "data: x"]);
        assert_eq!(buf.push(b"tail"), Vec::<String>::new());
        assert_eq!(buf.finish().as_deref(), Some("tail"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn keeps_multibyte_characters_split_across_chunks() {
        let bytes = "data: 안녕\n".as_bytes();
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(&bytes[..8]).is_empty());
        assert_eq!(buf.push(&bytes[8..]), vec!["data: 안녕"]);
    }

    #[test]
    fn only_data_lines_carry_payloads() {
        assert_eq!(data_payload("data: {}"), Some("{}"));
        assert_eq!(data_payload("data:{}"), Some("{}"));
        assert_eq!(data_payload("event: ping"), None);
        assert_eq!(data_payload(": keepalive"), None);
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(owned)
    }

    #[tokio::test]
    async fn relays_fragments_until_done_marker() {
        let body = chunks(&["data: a\n\ndata: b", "\nevent: x\ndata: \n", "data: [DONE]\ndata: late\n"]);
        let out: Vec<_> = spawn_relay(body, Provider::OpenAI, echo).collect().await;
        let texts: Vec<_> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn error_frame_ends_stream_with_err() {
        let body = chunks(&["data: a\ndata: ERR overloaded\ndata: b\n"]);
        let out: Vec<_> = spawn_relay(body, Provider::Anthropic, echo).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "a");
        let err = out[1].as_ref().unwrap_err();
        assert!(err.downcast_ref::<LlmDiagnosticsError>().is_some());
    }

    #[tokio::test]
    async fn dropping_receiver_drops_upstream_body() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());
        let body = futures::stream::unfold(guard, |guard| async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Some((Ok::<_, std::io::Error>(b"data: tick\n".to_vec()), guard))
        });

        let mut stream = spawn_relay(body, Provider::OpenAI, echo);
        assert_eq!(stream.next().await.unwrap().unwrap(), "tick");
        drop(stream);

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("upstream body was not dropped after the consumer went away");
    }
}
