//! Outbound byte queue that survives reconnects.

use bytes::Bytes;
use std::collections::VecDeque;

/// FIFO of encoded frames waiting for a writable socket.
///
/// The front frame may be partially written. If the socket dies mid-frame,
/// [`rewind`](Self::rewind) restarts that frame so the next socket receives it
/// whole.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    chunks: VecDeque<Bytes>,
    /// Bytes of the front chunk already handed to the socket.
    offset: usize,
    /// Unflushed bytes across all chunks.
    queued_bytes: usize,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame. Empty chunks are ignored.
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.queued_bytes += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Returns the unwritten remainder of the front frame.
    pub fn front(&self) -> Option<&[u8]> {
        self.chunks.front().map(|chunk| &chunk[self.offset..])
    }

    /// Marks `n` bytes of the front frame as written.
    pub fn advance(&mut self, n: usize) {
        let Some(front) = self.chunks.front() else {
            return;
        };
        let n = n.min(front.len() - self.offset);
        self.offset += n;
        self.queued_bytes -= n;
        if self.offset == front.len() {
            self.chunks.pop_front();
            self.offset = 0;
        }
    }

    /// Puts a partially written front frame back to its start.
    pub fn rewind(&mut self) {
        self.queued_bytes += self.offset;
        self.offset = 0;
    }

    /// Number of frames waiting, including a partially written one.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = OutboundQueue::new();
        queue.push(Bytes::from_static(b"w1"));
        queue.push(Bytes::from_static(b"w2"));
        queue.push(Bytes::from_static(b"w3"));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.queued_bytes(), 6);

        let mut written = Vec::new();
        while let Some(front) = queue.front() {
            written.extend_from_slice(front);
            let n = front.len();
            queue.advance(n);
        }
        assert_eq!(written, b"w1w2w3");
        assert!(queue.is_empty());
        assert_eq!(queue.queued_bytes(), 0);
    }

    #[test]
    fn test_partial_write_and_rewind() {
        let mut queue = OutboundQueue::new();
        queue.push(Bytes::from_static(b"hello"));
        queue.push(Bytes::from_static(b"world"));

        queue.advance(2);
        assert_eq!(queue.front(), Some(&b"llo"[..]));
        assert_eq!(queue.queued_bytes(), 8);

        queue.rewind();
        assert_eq!(queue.front(), Some(&b"hello"[..]));
        assert_eq!(queue.queued_bytes(), 10);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_advance_is_bounded() {
        let mut queue = OutboundQueue::new();
        queue.push(Bytes::from_static(b"ab"));
        queue.push(Bytes::from_static(b"cd"));
        queue.advance(10);
        assert_eq!(queue.front(), Some(&b"cd"[..]));
        assert_eq!(queue.queued_bytes(), 2);

        let mut empty = OutboundQueue::new();
        empty.advance(3);
        empty.push(Bytes::new());
        assert!(empty.is_empty());
    }
}
