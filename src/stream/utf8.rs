/// Incremental UTF-8 decoding for byte chunks.
///
/// Network chunks can end in the middle of a multi-byte character. The
/// incomplete tail is held back until the next chunk completes it; invalid
/// sequences become U+FFFD, matching `String::from_utf8_lossy`.
#[derive(Debug, Default, Clone)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut input = self.pending.as_slice();

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = input.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &after[bad..];
                        }
                        // Truncated character at the end: wait for more bytes
                        None => {
                            input = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = input.to_vec();
        out
    }

    /// Flush at end of input; a dangling partial character becomes U+FFFD
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "สวัสดี".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();

        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }

        assert_eq!(out, "สวัสดี");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_flushed_as_replacement() {
        let mut decoder = Utf8ChunkDecoder::new();
        // First two bytes of a three-byte character
        assert_eq!(decoder.decode(&[b'x', 0xE0, 0xB8]), "x");
        assert!(decoder.has_pending());
        assert_eq!(decoder.finish(), Some("\u{FFFD}".to_string()));
        assert!(decoder.finish().is_none());
    }
}
