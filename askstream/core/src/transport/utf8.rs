//! Incremental UTF-8 decoding across network reads.

/// Streaming UTF-8 decoder
///
/// A character split across two reads is carried over and completed by the
/// next read. Bytes that can never form valid UTF-8 become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one read, holding back an incomplete trailing character
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.carry);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush an incomplete trailing character at end of body
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let carry = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&carry).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_split_multibyte_char() {
        let bytes = "héllo".as_bytes();
        // 'é' is bytes 1..3
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
    }

    #[test]
    fn test_every_split_point() {
        let text = "añb€c😀d";
        let bytes = text.as_bytes();
        for i in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.decode(&bytes[..i]);
            out.push_str(&decoder.decode(&bytes[i..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at {i}");
        }
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn test_truncated_tail_flushed_lossy() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&"€".as_bytes()[..2]), "");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }
}
