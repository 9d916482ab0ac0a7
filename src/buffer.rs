//! Fixed-capacity rolling byte buffer for streaming parse.
//!
//! Bytes are appended at the tail in two steps: the caller writes into
//! [`RollingBuffer::writable_region`] and then calls [`RollingBuffer::commit`]
//! with the number of bytes actually written. Consumed bytes are removed from
//! the head with [`RollingBuffer::discard`], which shifts the remainder down
//! to offset 0.
//!
//! # Invariants
//! - `valid_len <= capacity`.
//! - The byte at offset `valid_len` is always [`TERMINATOR`], so the valid
//!   content can be treated as a self-delimited string.
//! - Storage is allocated once at construction and never reallocated.

use tracing::trace;

/// Marker byte that always follows the valid content.
pub const TERMINATOR: u8 = 0;

/// Default capacity in bytes, large enough for a worst-case tweet document.
pub const DEFAULT_BUFFER_CAPACITY: usize = 25_600;

/// A fixed-capacity byte accumulator with append-at-tail and
/// discard-from-head.
///
/// Calling [`commit`](Self::commit) or [`discard`](Self::discard) with
/// arguments that violate the invariants is a programming error and panics.
///
/// # Example
///
/// ```
/// use stream_notifier::buffer::RollingBuffer;
///
/// let mut buffer = RollingBuffer::with_capacity(16);
/// let region = buffer.writable_region();
/// region[..5].copy_from_slice(b"hello");
/// buffer.commit(5);
/// assert_eq!(buffer.valid_content(), b"hello");
///
/// buffer.discard(2);
/// assert_eq!(buffer.valid_content(), b"llo");
/// ```
pub struct RollingBuffer {
    /// Backing storage: `capacity` content bytes plus one terminator slot
    bytes: Vec<u8>,

    /// Number of valid bytes at the head of `bytes`
    valid_len: usize,
}

impl RollingBuffer {
    /// Allocate a buffer holding up to `capacity` bytes of content.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingBuffer capacity must be > 0");
        Self {
            bytes: vec![TERMINATOR; capacity + 1],
            valid_len: 0,
        }
    }

    /// Drop all content. Storage is kept.
    pub fn reset(&mut self) {
        self.valid_len = 0;
        self.bytes[0] = TERMINATOR;
    }

    /// Maximum number of content bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len() - 1
    }

    /// Number of valid content bytes.
    pub fn len(&self) -> usize {
        self.valid_len
    }

    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }

    /// Bytes that can still be appended before the buffer is full.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.valid_len
    }

    /// The region following the valid content that the next write may fill.
    ///
    /// Its length is the current write limit. Bytes written here are not
    /// part of the content until [`commit`](Self::commit) is called.
    pub fn writable_region(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        &mut self.bytes[self.valid_len..capacity]
    }

    /// Append `n` bytes previously written into the writable region.
    ///
    /// # Panics
    /// Panics if `n` exceeds [`remaining`](Self::remaining).
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.remaining(),
            "commit of {} bytes exceeds remaining capacity {}",
            n,
            self.remaining()
        );
        self.valid_len += n;
        self.bytes[self.valid_len] = TERMINATOR;
        trace!(committed = n, valid_bytes = self.valid_len, "Buffer commit");
    }

    /// The valid content, without the terminator.
    pub fn valid_content(&self) -> &[u8] {
        &self.bytes[..self.valid_len]
    }

    /// The valid content followed by its terminator byte.
    pub fn terminated_content(&self) -> &[u8] {
        &self.bytes[..=self.valid_len]
    }

    /// Remove the first `k` bytes, shifting the rest to offset 0.
    ///
    /// # Panics
    /// Panics if `k` exceeds [`len`](Self::len).
    pub fn discard(&mut self, k: usize) {
        assert!(
            k <= self.valid_len,
            "discard of {} bytes exceeds valid length {}",
            k,
            self.valid_len
        );
        if k == 0 {
            return;
        }

        // Ranges overlap when more than half the content survives.
        self.bytes.copy_within(k..self.valid_len, 0);
        self.valid_len -= k;
        self.bytes[self.valid_len] = TERMINATOR;
        trace!(discarded = k, valid_bytes = self.valid_len, "Buffer discard");
    }

    /// Remove everything up to and including `end_offset`.
    ///
    /// # Panics
    /// Panics if `end_offset` is not inside the valid content.
    pub fn discard_through(&mut self, end_offset: usize) {
        assert!(
            end_offset < self.valid_len,
            "offset {} is outside valid content of {} bytes",
            end_offset,
            self.valid_len
        );
        self.discard(end_offset + 1);
    }
}

impl std::fmt::Debug for RollingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingBuffer")
            .field("capacity", &self.capacity())
            .field("valid_len", &self.valid_len)
            .field("content", &String::from_utf8_lossy(self.valid_content()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn append(buffer: &mut RollingBuffer, data: &[u8]) {
        let region = buffer.writable_region();
        region[..data.len()].copy_from_slice(data);
        buffer.commit(data.len());
    }

    #[test]
    fn test_new_buffer_is_empty_and_terminated() {
        let buffer = RollingBuffer::with_capacity(8);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.remaining(), 8);
        assert_eq!(buffer.terminated_content(), &[TERMINATOR]);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_panics() {
        RollingBuffer::with_capacity(0);
    }

    #[test]
    fn test_writable_region_tracks_remaining() {
        let mut buffer = RollingBuffer::with_capacity(10);
        assert_eq!(buffer.writable_region().len(), 10);

        append(&mut buffer, b"abcd");
        assert_eq!(buffer.writable_region().len(), 6);
        assert_eq!(buffer.remaining(), 6);
    }

    #[test]
    fn test_commit_terminates_content() {
        let mut buffer = RollingBuffer::with_capacity(10);
        append(&mut buffer, b"abc");
        assert_eq!(buffer.valid_content(), b"abc");
        assert_eq!(buffer.terminated_content(), b"abc\0");
    }

    #[test]
    fn test_fill_to_capacity() {
        let mut buffer = RollingBuffer::with_capacity(4);
        append(&mut buffer, b"wxyz");
        assert_eq!(buffer.remaining(), 0);
        assert!(buffer.writable_region().is_empty());
        assert_eq!(buffer.terminated_content(), b"wxyz\0");
    }

    #[test]
    #[should_panic(expected = "exceeds remaining capacity")]
    fn test_commit_past_capacity_panics() {
        let mut buffer = RollingBuffer::with_capacity(4);
        buffer.commit(5);
    }

    #[test]
    fn test_discard_shifts_remainder() {
        let mut buffer = RollingBuffer::with_capacity(16);
        append(&mut buffer, b"abcdef");

        buffer.discard(2);
        assert_eq!(buffer.valid_content(), b"cdef");
        assert_eq!(buffer.terminated_content(), b"cdef\0");
        assert_eq!(buffer.remaining(), 12);
    }

    #[test]
    fn test_discard_overlapping_ranges() {
        let mut buffer = RollingBuffer::with_capacity(8);
        append(&mut buffer, b"abcdefgh");

        buffer.discard(1);
        assert_eq!(buffer.valid_content(), b"bcdefgh");
    }

    #[test]
    fn test_discard_zero_is_noop() {
        let mut buffer = RollingBuffer::with_capacity(8);
        append(&mut buffer, b"abc");
        buffer.discard(0);
        assert_eq!(buffer.valid_content(), b"abc");
    }

    #[test]
    fn test_discard_everything() {
        let mut buffer = RollingBuffer::with_capacity(8);
        append(&mut buffer, b"abc");
        buffer.discard(3);
        assert!(buffer.is_empty());
        assert_eq!(buffer.terminated_content(), &[TERMINATOR]);
    }

    #[test]
    #[should_panic(expected = "exceeds valid length")]
    fn test_discard_past_valid_panics() {
        let mut buffer = RollingBuffer::with_capacity(8);
        append(&mut buffer, b"abc");
        buffer.discard(4);
    }

    #[test]
    fn test_discard_through_includes_offset() {
        let mut buffer = RollingBuffer::with_capacity(16);
        append(&mut buffer, b"{}\n{\"a\"");

        buffer.discard_through(2);
        assert_eq!(buffer.valid_content(), b"{\"a\"");
    }

    #[test]
    #[should_panic(expected = "outside valid content")]
    fn test_discard_through_past_end_panics() {
        let mut buffer = RollingBuffer::with_capacity(16);
        append(&mut buffer, b"abc");
        buffer.discard_through(3);
    }

    #[test]
    fn test_reset_clears_content() {
        let mut buffer = RollingBuffer::with_capacity(8);
        append(&mut buffer, b"abcdefgh");
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.remaining(), 8);
        assert_eq!(buffer.terminated_content(), &[TERMINATOR]);
    }

    #[test]
    fn test_random_commit_discard_sequence_matches_model() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut buffer = RollingBuffer::with_capacity(64);
        let mut model: Vec<u8> = Vec::new();

        for _ in 0..2_000 {
            if rng.gen_bool(0.6) {
                let n = rng.gen_range(0..=buffer.remaining());
                let data: Vec<u8> = (0..n).map(|_| rng.gen_range(b'a'..=b'z')).collect();
                append(&mut buffer, &data);
                model.extend_from_slice(&data);
            } else {
                let k = rng.gen_range(0..=buffer.len());
                buffer.discard(k);
                model.drain(..k);
            }

            assert!(buffer.len() <= buffer.capacity());
            assert_eq!(buffer.valid_content(), model.as_slice());
            assert_eq!(buffer.terminated_content().last(), Some(&TERMINATOR));
        }
    }

    #[test]
    fn test_debug_shows_content() {
        let mut buffer = RollingBuffer::with_capacity(8);
        append(&mut buffer, b"hi");
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("valid_len: 2"));
        assert!(debug.contains("hi"));
    }
}
