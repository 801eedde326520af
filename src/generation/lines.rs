//! Line framing for streamed HTTP bodies (NDJSON and server-sent events).

use async_stream::stream;
use futures_util::stream::{BoxStream, StreamExt};

use super::FragmentStream;
use crate::error::RagError;

/// Accumulates raw body chunks and hands back complete lines.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line));
        }
        lines
    }

    /// Trailing text without a final newline, if any.
    pub(crate) fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(decode_line(&self.pending))
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(&['\r', '\n'][..])
        .to_string()
}

pub(crate) fn body_lines(
    response: reqwest::Response,
) -> BoxStream<'static, Result<String, reqwest::Error>> {
    Box::pin(stream! {
        let mut bytes = Box::pin(response.bytes_stream());
        let mut buffer = LineBuffer::default();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for line in buffer.push(&chunk) {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Some(line) = buffer.finish() {
            yield Ok(line);
        }
    })
}

/// Payload of an SSE `data:` line; `None` for comments, event names, blanks.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Turn a streamed response into answer fragments using a per-line parser.
///
/// `parse` returns `Ok(None)` for lines that carry no text. The first error
/// is yielded and ends the stream.
pub(crate) fn decode_fragments<F>(
    response: reqwest::Response,
    label: &'static str,
    parse: F,
) -> FragmentStream
where
    F: Fn(&str) -> Result<Option<String>, RagError> + Send + 'static,
{
    Box::pin(stream! {
        let mut lines = body_lines(response);
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(RagError::Failed(format!("{} stream interrupted: {}", label, e)));
                    break;
                }
            };
            match parse(&line) {
                Ok(Some(text)) => {
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}
