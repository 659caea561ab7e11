//! Incremental UTF-8 decoding for PTY output.
//!
//! PTY reads split the byte stream at arbitrary points, often in the middle
//! of a multi-byte character. The decoder holds back an incomplete trailing
//! sequence until the next chunk completes it.

/// Stateful decoder that carries incomplete sequences across chunks.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates a decoder with no carried bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a chunk, prefixed by any bytes carried from the previous call.
    ///
    /// Invalid sequences become U+FFFD. An incomplete sequence at the end is
    /// held back for the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Returns whether bytes are being carried.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flushes carried bytes, replacing them with U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}
