//! When to interrupt the other endpoint.
//!
//! Each side decides on its own whether its last operation warrants a
//! notification. Both decisions compare a value captured *before* the
//! operation against the state *after* it; comparing post-operation state on
//! both sides either double-signals or loses the wakeup.
//!
//! Producer side: the consumer sets `interrupt_mask` while it drains, and
//! before going idle it clears the mask, fences, and checks for data once more
//! (see [`RingBuffer::end_read`](crate::RingBuffer::end_read)). So the
//! producer only has to signal when it moved the ring from empty to non-empty
//! while the mask was clear.
//!
//! Consumer side: a blocked producer publishes the free space it needs in
//! `pending_send_sz`. The consumer signals once, on the read that moves the
//! free space across that threshold.

use crate::index::bytes_to_write;
use crate::layout::{FeatureBits, RingBufferHeader};
use crate::sync::{Ordering, fence};

/// Decide whether a write that started at `old_write` must notify the
/// consumer.
pub fn need_signal_after_write(header: &RingBufferHeader, old_write: u32) -> bool {
    // Order the write_index store before the mask load; pairs with the fence
    // in end_read.
    fence(Ordering::SeqCst);

    // Acquire keeps the read_index load below from moving above this one.
    if header.interrupt_mask.load(Ordering::Acquire) != 0 {
        return false;
    }

    let read_index = header.read_index.load(Ordering::Acquire);
    let signal = old_write == read_index;
    if signal {
        tracing::trace!(old_write, read_index, "ring went non-empty, signaling reader");
    }
    signal
}

/// Decide whether a read must notify a producer blocked on free space.
///
/// `prev_to_write` is the free space observed before the read.
pub fn need_signal_on_read(
    header: &RingBufferHeader,
    datasize: u32,
    prev_to_write: u32,
) -> bool {
    if !header.features().contains(FeatureBits::PENDING_SEND_SZ) {
        return false;
    }

    // Order the read_index store before the pending_send_sz load; pairs with
    // the fence in set_pending_send_sz.
    fence(Ordering::SeqCst);

    let pending = header.pending_send_sz.load(Ordering::Acquire);
    if pending == 0 {
        return false;
    }

    let write_index = header.write_index.load(Ordering::Acquire) % datasize;
    let read_index = header.read_index.load(Ordering::Relaxed) % datasize;
    let cur_to_write = bytes_to_write(write_index, read_index, datasize);

    let signal = prev_to_write < pending && cur_to_write >= pending;
    if signal {
        tracing::trace!(
            pending,
            prev_to_write,
            cur_to_write,
            "free space crossed pending_send_sz, signaling writer"
        );
    }
    signal
}
