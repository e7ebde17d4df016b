//! Fixed-capacity circular (ring) buffer for time-domain signal windows.
//!
//! When the buffer is full, new samples **overwrite** the oldest data so that
//! the most-recent `capacity` samples are always available.  This matches the
//! lip-sync scenario: the analyzer only ever cares about the newest window of
//! the signal, never its history.
//!
//! # Example
//!
//! ```rust
//! use avatar_voice::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1u8, 2, 3, 4, 5]); // 5 items → capacity 4 → oldest dropped
//! assert_eq!(buf.snapshot(), vec![2, 3, 4, 5]);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// Generic over `T: Copy + Default`; the lip-sync path uses `RingBuffer<u8>`
/// for unsigned magnitude bytes centred at 128.
///
/// ## Overflow behaviour
///
/// When [`push_slice`](Self::push_slice) would exceed `capacity`, the oldest
/// samples are silently overwritten.  The buffer never allocates beyond its
/// initial capacity.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data` to the buffer.
    ///
    /// If the total number of samples exceeds `capacity`, the oldest samples
    /// are overwritten (circular behaviour).
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    /// Copy all stored samples out in chronological order **without**
    /// consuming them.
    ///
    /// The analyzer polls this on every tick; the stream keeps writing in
    /// between, so reads must not reset the buffer.
    pub fn snapshot(&self) -> Vec<T> {
        if self.len == 0 {
            return Vec::new();
        }

        // When the buffer has never been fully filled, valid data starts at 0.
        // When the buffer is full (overflow has occurred), the oldest sample
        // sits at `write_pos` (the position the *next* write would go to).
        let read_pos = if self.len < self.capacity {
            0
        } else {
            self.write_pos
        };

        let mut result = Vec::with_capacity(self.len);
        for i in 0..self.len {
            result.push(self.buf[(read_pos + i) % self.capacity]);
        }
        result
    }

    /// Discard all samples and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` when the buffer has been filled to capacity at least
    /// once (i.e. overflow would occur on the next push).
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Basic push / snapshot ---------------------------------------------

    #[test]
    fn push_and_snapshot_within_capacity() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1u8, 2, 3]);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_full());
        assert_eq!(buf.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_does_not_consume() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1u8, 2]);
        let _ = buf.snapshot();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.snapshot(), vec![1, 2]);
    }

    #[test]
    fn push_exactly_capacity() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1u8, 2, 3, 4]);
        assert!(buf.is_full());
        assert_eq!(buf.snapshot(), vec![1, 2, 3, 4]);
    }

    // ---- Overflow (oldest sample discarded) --------------------------------

    #[test]
    fn overflow_by_one_drops_oldest() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1u8, 2, 3, 4, 5]); // 5 > capacity(4)

        assert_eq!(buf.len(), 4);
        // 1 was overwritten; remaining order must be preserved
        assert_eq!(buf.snapshot(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn overflow_by_full_capacity_keeps_newest() {
        let mut buf = RingBuffer::new(4);
        // Push 8 items — only last 4 survive
        buf.push_slice(&[1u8, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.snapshot(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn multiple_overflows_in_separate_calls() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1u8, 2, 3]); // fill
        buf.push_slice(&[4, 5]); // 2 more → overwrites 1 and 2

        assert_eq!(buf.snapshot(), vec![3, 4, 5]);
    }

    // ---- Clear semantics ---------------------------------------------------

    #[test]
    fn clear_resets_state() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1u8, 2, 3, 4, 5]);
        buf.clear();

        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);

        // Should be usable again after clear
        buf.push_slice(&[9u8]);
        assert_eq!(buf.snapshot(), vec![9]);
    }

    #[test]
    fn snapshot_empty_returns_empty_vec() {
        let buf: RingBuffer<u8> = RingBuffer::new(4);
        assert_eq!(buf.snapshot(), Vec::<u8>::new());
    }

    #[test]
    fn capacity_reported_correctly() {
        let buf: RingBuffer<u8> = RingBuffer::new(1024);
        assert_eq!(buf.capacity(), 1024);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<u8> = RingBuffer::new(0);
    }
}
