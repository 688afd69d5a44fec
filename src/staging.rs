//! The circular host-staging allocator.
//!
//! One contiguous host-visible buffer serves all transient per-frame upload
//! data. Byte charges are tracked as two monotonic counters: `allocated`
//! grows with every span (plus alignment padding and abandoned wrap tails),
//! `released` chases it as generations retire. Their difference is the
//! GPU-pending region; buffer offsets are the counters reduced modulo the
//! capacity, which keeps a completely full ring distinguishable from an
//! empty one.
//!
//! The frame resource ring records [`StagingRing::mark`] at each submit and
//! passes it back to [`StagingRing::release_to`] once that generation's
//! fence has signaled.
//!
//! Overflow is loud, never silent: an allocation that would land on
//! GPU-pending memory means the ring is undersized for the workload, and
//! this allocator reports it rather than blocking or corrupting.

use log::error;

use crate::errors::{KilnError, Result};

/// Offset-space allocator over one circular host-visible buffer.
///
/// The backing memory itself belongs to the backend; this tracks only the
/// cursor arithmetic, which is what every backend shares.
#[derive(Debug)]
pub struct StagingRing {
    capacity: u64,
    /// Cumulative bytes ever charged: spans, alignment padding, abandoned
    /// wrap tails. `allocated % capacity` is the host write offset.
    allocated: u64,
    /// Cumulative bytes handed back by retired generations. Never ahead of
    /// `allocated`; `released % capacity` is the oldest offset the GPU may
    /// still read.
    released: u64,
}

impl StagingRing {
    /// Creates a ring over `capacity` bytes. Capacity is fixed for the
    /// render context's lifetime.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            allocated: 0,
            released: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes currently unavailable because the GPU may still read them.
    #[must_use]
    pub fn pending_bytes(&self) -> u64 {
        self.allocated - self.released
    }

    /// The current high-water mark, a monotonic byte count. Recorded per
    /// frame at submit and passed back to [`Self::release_to`] when that
    /// generation's fence signals.
    #[must_use]
    pub fn mark(&self) -> u64 {
        self.allocated
    }

    /// Allocates a contiguous span of `size` bytes (size and offset both
    /// rounded up to `align`) and returns its buffer offset.
    ///
    /// If the span does not fit before the end of the buffer, the remaining
    /// tail is abandoned and the allocation restarts at offset 0 — a span
    /// is never split across the wrap boundary. Alignment padding and
    /// abandoned tails are charged to the current generation alongside the
    /// span itself.
    ///
    /// Fails when the total charge would leave more than the ring's
    /// capacity pending, which means the span would land on GPU-pending
    /// data. In development builds this also trips a debug assertion; in
    /// release the caller drops the work that needed the span.
    pub fn alloc(&mut self, size: u64, align: u64) -> Result<u64> {
        let align = align.max(1);
        let size = size.div_ceil(align) * align;

        if size == 0 || size > self.capacity {
            return self.overflow(size, align);
        }

        // Wrapping case: abandon the tail, restart at 0 (always aligned).
        let write = self.allocated % self.capacity;
        let aligned = write.div_ceil(align) * align;
        let (start, skipped) = if aligned + size <= self.capacity {
            (aligned, aligned - write)
        } else {
            (0, self.capacity - write)
        };

        if self.pending_bytes() + skipped + size > self.capacity {
            return self.overflow(size, align);
        }

        self.allocated += skipped + size;
        Ok(start)
    }

    /// Forgets all pending spans and rewinds both counters.
    ///
    /// Only valid once the device is known idle (ring recreation,
    /// shutdown); anything the GPU might still read must already be
    /// retired.
    pub fn reset(&mut self) {
        self.allocated = 0;
        self.released = 0;
    }

    /// Advances the released counter to a previously recorded
    /// [`Self::mark`]. Called once the fence of the generation that
    /// recorded the mark has signaled. Marks may arrive at or behind the
    /// released counter (an empty generation); they never move it back.
    pub fn release_to(&mut self, mark: u64) {
        debug_assert!(
            mark <= self.allocated,
            "release mark {mark} ahead of the allocation counter {}",
            self.allocated
        );
        self.released = mark.min(self.allocated).max(self.released);
    }

    fn overflow(&self, size: u64, align: u64) -> Result<u64> {
        error!(
            "staging ring overflow: {size} bytes (align {align}) into a {} byte ring \
             ({} bytes GPU-pending)",
            self.capacity,
            self.pending_bytes()
        );
        debug_assert!(
            false,
            "staging ring undersized: {size} byte allocation cannot be satisfied"
        );
        Err(KilnError::StagingOverflow {
            requested: size,
            align,
            capacity: self.capacity,
        })
    }
}
