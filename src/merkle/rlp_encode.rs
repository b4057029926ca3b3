//! RLP (Recursive Length Prefix) encoding.
//!
//! A minimal writer covering what trie nodes need: byte strings, empty
//! markers, verbatim embedding of already-encoded children, and nested
//! lists. Output matches the canonical Ethereum encoding bit for bit.

/// Append-only RLP writer over a reusable buffer.
#[derive(Clone, Debug, Default)]
pub struct RlpEncoder {
    buffer: Vec<u8>,
}

impl RlpEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Clears the buffer, keeping its allocation for the next node.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Encodes a byte slice as an RLP string.
    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            self.buffer.push(bytes[0]);
        } else if bytes.len() < 56 {
            self.buffer.push(0x80 + bytes.len() as u8);
            self.buffer.extend_from_slice(bytes);
        } else {
            let len_bytes = be_length_bytes(bytes.len());
            self.buffer.push(0xb7 + len_bytes.len() as u8);
            self.buffer.extend_from_slice(&len_bytes);
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Encodes the empty string, the marker for absent children.
    pub fn encode_empty(&mut self) {
        self.buffer.push(0x80);
    }

    /// Appends bytes that are already valid RLP, embedding an inline child
    /// node verbatim.
    pub fn encode_raw(&mut self, encoded: &[u8]) {
        self.buffer.extend_from_slice(encoded);
    }

    /// Opens a list; the returned position is passed to [`finish_list`]
    /// once the payload has been written.
    ///
    /// [`finish_list`]: RlpEncoder::finish_list
    pub fn start_list(&mut self) -> usize {
        self.buffer.push(0);
        self.buffer.len() - 1
    }

    /// Closes a list opened at `start`, fixing up the header now that the
    /// payload length is known.
    pub fn finish_list(&mut self, start: usize) {
        let payload_len = self.buffer.len() - start - 1;
        if payload_len < 56 {
            self.buffer[start] = 0xc0 + payload_len as u8;
        } else {
            // The header grows; shift the payload right to make room.
            let len_bytes = be_length_bytes(payload_len);
            let shift = len_bytes.len();
            let old_len = self.buffer.len();
            self.buffer.resize(old_len + shift, 0);
            self.buffer.copy_within(start + 1..old_len, start + 1 + shift);
            self.buffer[start] = 0xf7 + shift as u8;
            self.buffer[start + 1..start + 1 + shift].copy_from_slice(&len_bytes);
        }
    }

    /// Encodes a list whose items are written by the closure.
    pub fn encode_list<F>(&mut self, items: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.start_list();
        items(self);
        self.finish_list(start);
    }
}

/// Big-endian length bytes without leading zeros.
fn be_length_bytes(mut len: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    while len > 0 {
        bytes.push((len & 0xFF) as u8);
        len >>= 8;
    }
    bytes.reverse();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_empty_string() {
        let mut enc = RlpEncoder::new();
        enc.encode_empty();
        assert_eq!(enc.as_bytes(), &[0x80]);
    }

    #[test]
    fn encode_single_bytes() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&[0x7F]);
        assert_eq!(enc.as_bytes(), &[0x7F]);

        enc.clear();
        enc.encode_bytes(&[0x80]);
        assert_eq!(enc.as_bytes(), &[0x81, 0x80]);
    }

    #[test]
    fn encode_short_string() {
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(b"dog");
        assert_eq!(enc.as_bytes(), &[0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn encode_long_string() {
        let data = [0xAAu8; 60];
        let mut enc = RlpEncoder::new();
        enc.encode_bytes(&data);
        assert_eq!(enc.as_bytes()[0], 0xB8);
        assert_eq!(enc.as_bytes()[1], 60);
        assert_eq!(&enc.as_bytes()[2..], &data);
    }

    #[test]
    fn encode_short_list() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_bytes(b"cat");
            e.encode_bytes(b"dog");
        });
        assert_eq!(
            enc.as_bytes(),
            &[0xC8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn encode_long_list_shifts_payload() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            for _ in 0..30 {
                e.encode_bytes(b"ab");
            }
        });
        // 30 items of 3 bytes each: payload 90, one length byte.
        assert_eq!(enc.as_bytes()[0], 0xF8);
        assert_eq!(enc.as_bytes()[1], 90);
        assert_eq!(enc.as_bytes().len(), 92);
        assert_eq!(&enc.as_bytes()[2..5], &[0x82, b'a', b'b']);
    }

    #[test]
    fn raw_bytes_are_embedded_verbatim() {
        let mut inner = RlpEncoder::new();
        inner.encode_list(|e| {
            e.encode_bytes(b"k");
            e.encode_bytes(b"v");
        });

        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_raw(inner.as_bytes());
            e.encode_empty();
        });
        assert_eq!(enc.as_bytes()[0], 0xC0 + inner.as_bytes().len() as u8 + 1);
        assert_eq!(&enc.as_bytes()[1..1 + inner.as_bytes().len()], inner.as_bytes());
    }

    #[test]
    fn nested_lists() {
        let mut enc = RlpEncoder::new();
        enc.encode_list(|e| {
            e.encode_list(|e| e.encode_bytes(b"x"));
            e.encode_empty();
        });
        assert_eq!(enc.as_bytes(), &[0xC3, 0xC1, b'x', 0x80]);
    }
}
