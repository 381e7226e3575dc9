//! Event-stream record decoder.

use crate::error::{truncate_chars, DecodeError};

use super::DecodedFrame;

/// Record payload prefix
const DATA_PREFIX: &str = "data:";

/// Known event-stream fields that carry no answer text
const IGNORED_FIELDS: [&str; 3] = ["event", "id", "retry"];

/// Longest line quoted back in a decode error
const MAX_QUOTED_LINE: usize = 80;

/// Decoder for blank-line separated `data:` records
///
/// Incomplete records are held until their terminating blank line arrives.
/// Leading whitespace is trimmed from the first non-empty payload of the
/// session only; the backend prefixes its first token with a space.
#[derive(Debug)]
pub struct EventStreamDecoder {
    buffer: String,
    leading_trimmed: bool,
    max_record_bytes: usize,
}

impl EventStreamDecoder {
    /// Create a decoder that rejects unterminated records over `max_record_bytes`
    #[must_use]
    pub fn new(max_record_bytes: usize) -> Self {
        Self {
            buffer: String::new(),
            leading_trimmed: false,
            max_record_bytes,
        }
    }

    /// Feed one physical read
    ///
    /// # Errors
    ///
    /// Fails on unrecognized lines and on oversized unterminated records.
    pub fn push(&mut self, chunk: &str) -> Result<Vec<DecodedFrame>, DecodeError> {
        let mut frames = Vec::new();
        self.push_into(chunk, &mut frames)?;
        Ok(frames)
    }

    /// Like [`push`](Self::push), but records decoded before an error stay
    /// in `frames`
    ///
    /// # Errors
    ///
    /// Fails on unrecognized lines and on oversized unterminated records.
    pub fn push_into(
        &mut self,
        chunk: &str,
        frames: &mut Vec<DecodedFrame>,
    ) -> Result<(), DecodeError> {
        self.buffer.push_str(chunk);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        while let Some(pos) = self.buffer.find("\n\n") {
            let record: String = self.buffer.drain(..pos + 2).collect();
            self.decode_record(&record[..pos], frames)?;
        }

        if self.buffer.len() > self.max_record_bytes {
            return Err(DecodeError::RecordTooLarge {
                size: self.buffer.len(),
                max: self.max_record_bytes,
            });
        }
        Ok(())
    }

    /// Flush a trailing record that never got its blank line
    ///
    /// # Errors
    ///
    /// Fails if the trailing record contains an unrecognized line.
    pub fn finish(&mut self) -> Result<Vec<DecodedFrame>, DecodeError> {
        let mut frames = Vec::new();
        self.finish_into(&mut frames)?;
        Ok(frames)
    }

    /// Like [`finish`](Self::finish), appending to `frames`
    ///
    /// # Errors
    ///
    /// Fails if the trailing record contains an unrecognized line.
    pub fn finish_into(&mut self, frames: &mut Vec<DecodedFrame>) -> Result<(), DecodeError> {
        let record = std::mem::take(&mut self.buffer);
        self.decode_record(&record, frames)
    }

    /// Bytes held for an incomplete record
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn decode_record(
        &mut self,
        record: &str,
        frames: &mut Vec<DecodedFrame>,
    ) -> Result<(), DecodeError> {
        for line in record.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
                if let Some(text) = self.payload_text(payload) {
                    frames.push(DecodedFrame::Text(text));
                }
                continue;
            }
            let field = line.split(':').next().unwrap_or(line);
            if IGNORED_FIELDS.contains(&field) {
                continue;
            }
            return Err(DecodeError::UnrecognizedLine {
                line: truncate_chars(line, MAX_QUOTED_LINE),
            });
        }
        Ok(())
    }

    fn payload_text(&mut self, payload: &str) -> Option<String> {
        let mut text = payload;
        if !self.leading_trimmed && !text.is_empty() {
            text = text.trim_start();
            if !text.is_empty() {
                self.leading_trimmed = true;
            }
        }
        // Empty payloads are keep-alives
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(frames: Vec<DecodedFrame>) -> Vec<String> {
        frames
            .into_iter()
            .map(|f| match f {
                DecodedFrame::Text(t) => t,
                other => panic!("unexpected frame {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_records_before_error_are_kept() {
        let mut decoder = EventStreamDecoder::new(1024);
        let mut frames = Vec::new();
        let err = decoder
            .push_into("data: ok\n\nnonsense\n\n", &mut frames)
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedLine { .. }));
        assert_eq!(texts(frames), vec!["ok"]);
    }

    #[test]
    fn test_single_record() {
        let mut decoder = EventStreamDecoder::new(1024);
        let frames = decoder.push("data: Hello\n\n").unwrap();
        assert_eq!(texts(frames), vec!["Hello"]);
    }

    #[test]
    fn test_only_first_payload_is_trimmed() {
        let mut decoder = EventStreamDecoder::new(1024);
        let frames = decoder.push("data: Hello\n\ndata: world\n\n").unwrap();
        assert_eq!(texts(frames), vec!["Hello", " world"]);
    }

    #[test]
    fn test_keepalive_does_not_consume_trim() {
        let mut decoder = EventStreamDecoder::new(1024);
        let frames = decoder.push("data:\n\ndata:   \n\ndata:  Hi\n\n").unwrap();
        assert_eq!(texts(frames), vec!["Hi"]);
    }

    #[test]
    fn test_partial_record_held_until_terminated() {
        let mut decoder = EventStreamDecoder::new(1024);
        assert!(decoder.push("data: Hel").unwrap().is_empty());
        assert!(decoder.buffered() > 0);
        assert_eq!(texts(decoder.push("lo\n").unwrap()), Vec::<String>::new());
        assert_eq!(texts(decoder.push("\ndata: x").unwrap()), vec!["Hello"]);
        assert_eq!(texts(decoder.finish().unwrap()), vec![" x"]);
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut decoder = EventStreamDecoder::new(1024);
        let mut frames = decoder.push("data: a\r\n\r").unwrap();
        frames.extend(decoder.push("\ndata: b\r\n\r\n").unwrap());
        assert_eq!(texts(frames), vec!["a", " b"]);
    }

    #[test]
    fn test_multiple_data_lines_yield_multiple_fragments() {
        let mut decoder = EventStreamDecoder::new(1024);
        let frames = decoder.push("data: one\ndata: two\n\n").unwrap();
        assert_eq!(texts(frames), vec!["one", " two"]);
    }

    #[test]
    fn test_known_fields_and_comments_ignored() {
        let mut decoder = EventStreamDecoder::new(1024);
        let frames = decoder
            .push(": ping\nevent: message\nid: 7\nretry: 100\ndata: ok\n\n")
            .unwrap();
        assert_eq!(texts(frames), vec!["ok"]);
    }

    #[test]
    fn test_unrecognized_line_is_decode_error() {
        let mut decoder = EventStreamDecoder::new(1024);
        let err = decoder.push("garbage here\n\n").unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnrecognizedLine {
                line: "garbage here".to_string()
            }
        );
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut decoder = EventStreamDecoder::new(8);
        let err = decoder.push("data: 0123456789").unwrap_err();
        assert!(matches!(err, DecodeError::RecordTooLarge { max: 8, .. }));
    }

    #[test]
    fn test_finish_with_empty_buffer() {
        let mut decoder = EventStreamDecoder::new(1024);
        decoder.push("data: a\n\n").unwrap();
        assert!(decoder.finish().unwrap().is_empty());
    }
}
