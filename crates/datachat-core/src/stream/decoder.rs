//! Frame decoder for the blank-line-delimited event stream.
//!
//! The response body is a sequence of records separated by a blank line:
//!
//! ```text
//! event: sql_generated
//! data: {"sql":"SELECT 1"}
//!
//! ```
//!
//! Chunks arrive with arbitrary boundaries, including in the middle of a
//! multi-byte character. The decoder buffers raw bytes and only converts a
//! record to text once its separator has been seen, so a split code point is
//! always reassembled before decoding.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use datachat_types::error::StreamError;
use datachat_types::event::RawFrame;

use super::transport::ByteStream;

/// Boxed stream of decoded frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, StreamError>> + Send + 'static>>;

/// Incremental decoder from byte chunks to `RawFrame`s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Offset up to which `buffer` is known to hold no separator.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completed, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((end, consumed)) = find_separator(&self.buffer, self.scanned) {
            let record: Vec<u8> = self.buffer.drain(..consumed).collect();
            self.scanned = 0;
            if let Some(frame) = parse_record(&record[..end]) {
                frames.push(frame);
            }
        }
        // A separator is at most 3 bytes; rescan the tail on the next push.
        self.scanned = self.buffer.len().saturating_sub(2);
        frames
    }

    /// Flush the trailing record at end of stream.
    ///
    /// Returns a frame only if the remaining bytes form one.
    pub fn finish(&mut self) -> Option<RawFrame> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        tracing::debug!(bytes = rest.len(), "flushing unterminated trailing frame");
        parse_record(&rest)
    }

    /// Number of bytes held back waiting for a separator.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Find the first blank-line separator at or after `from`.
///
/// Accepts `\n\n`, `\r\n\r\n` and `\n\r\n`. Returns the end of the record
/// and the number of bytes to consume including the separator.
fn find_separator(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, i + 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, i + 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parse one record into a frame.
///
/// `event:` sets the type, `data:` lines form the payload (joined with a
/// newline when repeated), anything else is ignored. A record with neither
/// field yields `None`.
pub fn parse_record(record: &[u8]) -> Option<RawFrame> {
    let text = String::from_utf8_lossy(record);
    let mut frame = RawFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_start();
        if let Some(value) = line.strip_prefix("event:") {
            frame.event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        }
    }

    if !data_lines.is_empty() {
        frame.data = Some(data_lines.join("\n"));
    }

    if frame.is_empty() {
        None
    } else {
        Some(frame)
    }
}

/// Decode a byte stream into frames.
///
/// A transport error is yielded once and ends the stream; frames completed
/// before the error have already been yielded.
pub fn frame_stream(mut chunks: ByteStream) -> FrameStream {
    Box::pin(async_stream::try_stream! {
        let mut decoder = FrameDecoder::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                yield frame;
            }
        }
        if let Some(frame) = decoder.finish() {
            yield frame;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const STREAM: &str = "event: thinking\ndata: {\"content\":\"分析问题中…\"}\n\n\
event: sql_generated\ndata: {\"sql\":\"SELECT 1\"}\n\n\
: keep-alive comment\n\n\
event: summary\ndata: {\"content\":\"共计 3 行 ✓\"}\n\n";

    fn decode_in_chunks(input: &[u8], sizes: &[usize]) -> Vec<RawFrame> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut rest = input;
        let mut i = 0;
        while !rest.is_empty() {
            let n = sizes[i % sizes.len()].min(rest.len());
            frames.extend(decoder.push(&rest[..n]));
            rest = &rest[n..];
            i += 1;
        }
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn decodes_whole_input() {
        let frames = decode_in_chunks(STREAM.as_bytes(), &[STREAM.len()]);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].event.as_deref(), Some("thinking"));
        assert_eq!(
            frames[0].data.as_deref(),
            Some("{\"content\":\"分析问题中…\"}")
        );
        assert_eq!(frames[1], RawFrame::new("sql_generated", "{\"sql\":\"SELECT 1\"}"));
        assert_eq!(frames[2].event.as_deref(), Some("summary"));
    }

    #[test]
    fn every_two_way_split_yields_same_frames() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_chunks(bytes, &[bytes.len()]);
        for split in 1..bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.push(&bytes[..split]);
            frames.extend(decoder.push(&bytes[split..]));
            frames.extend(decoder.finish());
            assert_eq!(frames, expected, "split at byte {split}");
        }
    }

    #[test]
    fn single_byte_chunks_reassemble_code_points() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_chunks(bytes, &[bytes.len()]);
        assert_eq!(decode_in_chunks(bytes, &[1]), expected);
        assert_eq!(decode_in_chunks(bytes, &[2, 5, 3]), expected);
    }

    #[test]
    fn accepts_crlf_separators() {
        let input = b"event: done\r\ndata: {}\r\n\r\nevent: error\r\ndata: {\"message\":\"x\"}\r\n\r\n";
        let frames = decode_in_chunks(input, &[7]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], RawFrame::new("done", "{}"));
        assert_eq!(frames[1].data.as_deref(), Some("{\"message\":\"x\"}"));
    }

    #[test]
    fn retains_incomplete_record_until_separator() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"event: sql_executing\ndata: {}").is_empty());
        assert!(decoder.buffered_len() > 0);
        let frames = decoder.push(b"\n\n");
        assert_eq!(frames, vec![RawFrame::new("sql_executing", "{}")]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn drops_records_without_event_or_data() {
        let frames = decode_in_chunks(b"id: 7\nretry: 100\n\n\n\nevent: done\n\n", &[64]);
        assert_eq!(
            frames,
            vec![RawFrame {
                event: Some("done".to_string()),
                data: None,
            }]
        );
    }

    #[test]
    fn data_only_record_is_kept() {
        let frames = decode_in_chunks(b"data: {\"event\":\"done\",\"data\":{}}\n\n", &[4]);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].event.is_none());
        assert_eq!(frames[0].data.as_deref(), Some("{\"event\":\"done\",\"data\":{}}"));
    }

    #[test]
    fn repeated_data_lines_are_joined() {
        let frame = parse_record(b"event: summary\ndata: line one\ndata: line two").unwrap();
        assert_eq!(frame.data.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"event: done\ndata: {}\n").is_empty());
        assert_eq!(decoder.finish(), Some(RawFrame::new("done", "{}")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn finish_ignores_trailing_whitespace() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"event: done\ndata: {}\n\n\n");
        assert_eq!(decoder.finish(), None);
    }

    #[tokio::test]
    async fn frame_stream_yields_frames_then_error() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"event: thinking\ndata: {\"content\":\"a\"}\n")),
            Ok(Bytes::from_static(b"\nevent: sql_gen")),
            Err(StreamError::Body("connection reset".to_string())),
        ];
        let mut frames = frame_stream(Box::pin(futures_util::stream::iter(chunks)));

        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(first.event.as_deref(), Some("thinking"));
        let err = frames.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::Body(_)));
        assert!(frames.next().await.is_none());
    }
}
