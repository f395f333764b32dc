//! Incremental splitting of an event-stream body into frames.
//!
//! Reads from the network arrive at arbitrary boundaries: a read can end in the
//! middle of a frame, in the middle of a multi-byte character, or carry several
//! frames at once. The decoder keeps the unterminated tail between reads and
//! only hands out lines that have seen their `\n`.

use crate::models::event::DATA_PREFIX;

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    // leading bytes of `buf` already known to hold no `\n`
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next read. Returns the payload of every `data: ` line completed
    /// by these bytes, in arrival order, with the prefix removed.
    ///
    /// Lines without the prefix (blank separators, comments, `event:` fields)
    /// are dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            let line = &self.buf[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) {
                frames.push(String::from_utf8_lossy(payload).into_owned());
            }
            start = end + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        frames
    }

    /// Number of buffered bytes still waiting for their line terminator
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_line_in_small_reads_is_scanned_once() {
        let mut decoder = FrameDecoder::new();
        let payload = format!("{{\"type\":\"chunk\",\"content\":\"{}\"}}", "x".repeat(4096));
        let line = format!("data: {}", payload);

        for (read, byte) in line.as_bytes().chunks(1).enumerate() {
            assert!(decoder.push(byte).is_empty());
            assert_eq!(decoder.scanned, read + 1);
        }
        assert_eq!(decoder.push(b"\n\n"), vec![payload]);
        assert_eq!(decoder.scanned, 0);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_scanned_tail_resumes_after_frames() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(
            decoder.push(b"data: {\"type\":\"done\"}\ndata: ab"),
            vec![r#"{"type":"done"}"#]
        );
        assert_eq!(decoder.scanned, 8);
        assert_eq!(decoder.push(b"c\n"), vec!["abc"]);
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"type\":\"done\"}\n\n");
        assert_eq!(frames, vec![r#"{"type":"done"}"#]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_half_frame_waits_for_newline() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"ch").is_empty());
        assert_eq!(decoder.pending(), 17);

        let frames = decoder.push(b"unk\",\"content\":\"hi\"}\n\n");
        assert_eq!(frames, vec![r#"{"type":"chunk","content":"hi"}"#]);
    }

    #[test]
    fn test_frame_split_across_three_reads() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: {\"type\":").is_empty());
        let frames = decoder.push(b"\"done\"}\n");
        assert_eq!(frames, vec![r#"{"type":"done"}"#]);
    }

    #[test]
    fn test_many_frames_in_one_read() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(
            b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\ndata: {\"type\":\"chunk\",\"content\":\"b\"}\n\ndata: {\"type\":\"do",
        );
        assert_eq!(
            frames,
            vec![
                r#"{"type":"chunk","content":"a"}"#,
                r#"{"type":"chunk","content":"b"}"#
            ]
        );
        assert_eq!(decoder.push(b"ne\"}\n"), vec![r#"{"type":"done"}"#]);
    }

    #[test]
    fn test_crlf_and_foreign_lines() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b": keep-alive\r\nevent: message\r\ndata: {}\r\n\r\n");
        assert_eq!(frames, vec!["{}"]);
    }

    #[test]
    fn test_multibyte_character_split_between_reads() {
        let text = "data: {\"content\":\"caf\u{e9}\"}\n".as_bytes();
        let split = text.len() - 4;
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["{\"content\":\"caf\u{e9}\"}"]);
    }

    #[test]
    fn test_prefix_requires_space() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data:{\"type\":\"done\"}\n").is_empty());
    }
}
