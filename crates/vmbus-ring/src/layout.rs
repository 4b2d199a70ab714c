//! Shared memory layout of a ring buffer.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RingBufferHeader (one page)                                 │
//! │    write_index     u32   producer-owned                      │
//! │    read_index      u32   consumer-owned                      │
//! │    interrupt_mask  u32   consumer-owned                      │
//! │    pending_send_sz u32   producer-owned                      │
//! │    reserved        48 bytes                                  │
//! │    feature_bits    u32   set once at init                    │
//! │    reserved        up to the end of the page                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Data area (ring_size - header bytes)                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use bitflags::bitflags;

use crate::sync::{AtomicU32, Ordering};

/// Size the header must have on both endpoints.
pub const PAGE_SIZE: usize = 4096;

/// Size of the header as laid out by this build.
pub const HEADER_SIZE: usize = size_of::<RingBufferHeader>();

const RESERVED1_WORDS: usize = 12;
const RESERVED2_LEN: usize = PAGE_SIZE - (5 + RESERVED1_WORDS) * size_of::<u32>();

bitflags! {
    /// Capabilities negotiated when the ring is created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureBits: u32 {
        /// The consumer signals the producer when `pending_send_sz` bytes
        /// become free.
        const PENDING_SEND_SZ = 1 << 0;
    }
}

impl Default for FeatureBits {
    fn default() -> Self {
        FeatureBits::PENDING_SEND_SZ
    }
}

/// Ring header at the start of the shared region.
#[repr(C)]
pub struct RingBufferHeader {
    /// Offset of the next byte the producer will write.
    pub write_index: AtomicU32,
    /// Offset of the next byte the consumer will read.
    pub read_index: AtomicU32,
    /// Nonzero while the consumer is draining and does not want interrupts.
    pub interrupt_mask: AtomicU32,
    /// Free bytes the producer is blocked on, or 0.
    pub pending_send_sz: AtomicU32,
    _reserved1: [u32; RESERVED1_WORDS],
    /// Raw [`FeatureBits`].
    pub feature_bits: AtomicU32,
    _reserved2: [u8; RESERVED2_LEN],
}

#[cfg(not(feature = "loom"))]
const _: () = assert!(core::mem::size_of::<RingBufferHeader>() == PAGE_SIZE);

impl RingBufferHeader {
    /// A fresh header: both indices at 0, mask clear, nothing pending.
    pub fn new(features: FeatureBits) -> Self {
        Self {
            write_index: AtomicU32::new(0),
            read_index: AtomicU32::new(0),
            interrupt_mask: AtomicU32::new(0),
            pending_send_sz: AtomicU32::new(0),
            _reserved1: [0; RESERVED1_WORDS],
            feature_bits: AtomicU32::new(features.bits()),
            _reserved2: [0; RESERVED2_LEN],
        }
    }

    #[inline]
    pub fn features(&self) -> FeatureBits {
        FeatureBits::from_bits_truncate(self.feature_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn interrupt_masked(&self) -> bool {
        self.interrupt_mask.load(Ordering::Acquire) != 0
    }
}
