//! Fixed-capacity append/consume byte buffer used by every parser and
//! serializer. Mirrors the C implementation's `struct buf` / `buf_fill`
//! / `buf_consume` contract: parsers only ever look at committed bytes
//! and either decode a whole message or report that more data is
//! needed, without mutating anything already committed.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Every wire format fits comfortably inside this many bytes; the
/// longest frame (a JSON object) is far smaller in practice.
pub const BUF_LEN_MAX: usize = 2048;

/// An append-at-tail, consume-at-head byte buffer with a hard capacity.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            data: Vec::with_capacity(BUF_LEN_MAX),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= BUF_LEN_MAX
    }

    /// Removes the first `n` bytes, shifting the remainder to the head.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.data.len(), "consume past buffer end");
        self.data.drain(0..n);
    }

    /// Appends bytes produced by a callback (e.g. a synchronous read).
    /// Returns `false` if the buffer is already full.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if self.data.len() + bytes.len() > BUF_LEN_MAX {
            return false;
        }
        self.data.extend_from_slice(bytes);
        true
    }

    /// Reads once from `reader` into the free tail space and appends
    /// what was read. Returns the number of bytes read (`0` means EOF).
    pub async fn fill_from<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> std::io::Result<usize> {
        let free = BUF_LEN_MAX.saturating_sub(self.data.len());
        if free == 0 {
            return Ok(0);
        }
        let mut tmp = vec![0u8; free];
        let n = reader.read(&mut tmp).await?;
        tmp.truncate(n);
        self.data.extend_from_slice(&tmp);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_consume_compacts() {
        let mut buf = Buffer::new();
        assert!(buf.append(b"hello"));
        assert_eq!(buf.as_slice(), b"hello");
        buf.consume(2);
        assert_eq!(buf.as_slice(), b"llo");
    }

    #[test]
    fn append_rejects_when_full() {
        let mut buf = Buffer::new();
        assert!(buf.append(&vec![0u8; BUF_LEN_MAX]));
        assert!(buf.is_full());
        assert!(!buf.append(b"x"));
    }
}
