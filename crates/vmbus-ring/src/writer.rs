use crate::error::RingError;
use crate::packet::{TRAILER_SIZE, prev_indices};
use crate::ring::RingBuffer;
use crate::signal::need_signal_after_write;
use crate::sync::{Ordering, fence};

impl RingBuffer {
    /// Append one packet made of `segments`, in order, plus its trailer.
    ///
    /// Returns whether the consumer must be signaled. Fails with
    /// [`RingError::WouldBlock`] when the packet and trailer do not fit with a
    /// byte to spare; nothing is written in that case.
    pub fn write(&mut self, segments: &[&[u8]]) -> Result<bool, RingError> {
        self.write_packet(segments, false)
    }

    /// Like [`write`](Self::write), for producers sharing one handle across
    /// threads. The capacity check through the index update runs under the
    /// handle's write lock.
    pub fn write_locked(&self, segments: &[&[u8]]) -> Result<bool, RingError> {
        self.write_packet(segments, true)
    }

    fn write_packet(&self, segments: &[&[u8]], use_lock: bool) -> Result<bool, RingError> {
        let total = segments.iter().map(|s| s.len() as u64).sum::<u64>() + TRAILER_SIZE as u64;

        let guard = use_lock.then(|| self.write_lock.lock());

        let snapshot = self.indices();
        // Strictly less: a write that fills the ring would make it look empty.
        if snapshot.bytes_available().to_write as u64 <= total {
            return Err(RingError::WouldBlock);
        }

        let data = self.data();
        let old_write = snapshot.next_write_location();
        let mut next = old_write;
        for segment in segments {
            next = unsafe { data.copy_in(next, segment) };
        }
        next = unsafe { data.copy_in(next, &prev_indices(old_write).to_le_bytes()) };

        // Payload and trailer must be visible before the new index.
        fence(Ordering::SeqCst);
        self.header().write_index.store(next, Ordering::Release);

        drop(guard);

        Ok(need_signal_after_write(self.header(), old_write))
    }
}
