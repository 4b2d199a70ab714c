use core::mem::align_of;
use core::ptr;

use crate::copy::RingData;
use crate::error::RingError;
use crate::index::{Avail, IndexSnapshot};
use crate::layout::{FeatureBits, HEADER_SIZE, PAGE_SIZE, RingBufferHeader};
use crate::region::Region;
use crate::sync::{Mutex, Ordering, fence};

/// Configuration for creating or attaching to a ring.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Feature bits written into a new header.
    pub features: FeatureBits,
    /// Size the shared header must have.
    pub page_size: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            features: FeatureBits::default(),
            page_size: PAGE_SIZE,
        }
    }
}

/// One endpoint's handle on a shared ring buffer.
///
/// The producer holds one handle and the consumer another, each over its own
/// mapping of the same region. Writes go through [`write`](Self::write) (one
/// producer, enforced by `&mut self`) or [`write_locked`](Self::write_locked)
/// (any number of producer threads sharing the handle). Reads always need
/// `&mut self`.
pub struct RingBuffer {
    region: Region,
    data: RingData,
    ring_size: u32,
    datasize: u32,
    pub(crate) write_lock: Mutex<()>,
}

impl RingBuffer {
    /// Initialize a new ring over `region` with the default configuration.
    ///
    /// # Safety
    ///
    /// The region must be writable, exclusively owned during initialization,
    /// and must outlive the returned handle and every handle attached to it.
    pub unsafe fn init(region: Region) -> Result<Self, RingError> {
        unsafe { Self::init_with(region, &RingConfig::default()) }
    }

    /// Initialize a new ring over `region`.
    ///
    /// Writes a fresh header (indices at 0, mask clear, nothing pending,
    /// `config.features`). The data area is left as is.
    ///
    /// # Safety
    ///
    /// Same as [`init`](Self::init).
    pub unsafe fn init_with(region: Region, config: &RingConfig) -> Result<Self, RingError> {
        let (ring_size, datasize) = check_region(region, config)?;

        unsafe {
            ptr::write(
                region.as_ptr() as *mut RingBufferHeader,
                RingBufferHeader::new(config.features),
            );
        }

        tracing::debug!(
            ring_size,
            datasize,
            features = config.features.bits(),
            "ring buffer initialized"
        );

        Ok(unsafe { Self::from_region(region, ring_size, datasize) })
    }

    /// Attach to a ring another endpoint already initialized.
    ///
    /// # Safety
    ///
    /// The region must contain a header written by [`init`](Self::init) and
    /// must outlive the returned handle.
    pub unsafe fn attach(region: Region) -> Result<Self, RingError> {
        unsafe { Self::attach_with(region, &RingConfig::default()) }
    }

    /// Attach with an explicit configuration. Only `page_size` is used; the
    /// feature bits come from the shared header.
    ///
    /// # Safety
    ///
    /// Same as [`attach`](Self::attach).
    pub unsafe fn attach_with(region: Region, config: &RingConfig) -> Result<Self, RingError> {
        let (ring_size, datasize) = check_region(region, config)?;
        let ring = unsafe { Self::from_region(region, ring_size, datasize) };

        tracing::debug!(
            ring_size,
            datasize,
            features = ring.features().bits(),
            "attached to ring buffer"
        );

        Ok(ring)
    }

    unsafe fn from_region(region: Region, ring_size: u32, datasize: u32) -> Self {
        Self {
            region,
            data: unsafe { RingData::from_raw(region.offset(HEADER_SIZE), datasize) },
            ring_size,
            datasize,
            write_lock: Mutex::new(()),
        }
    }

    /// Tear down this endpoint's handle. The backing memory belongs to
    /// whoever mapped the region, so nothing is released here.
    pub fn cleanup(self) {
        tracing::trace!(ring_size = self.ring_size, "ring buffer handle released");
    }

    #[inline]
    pub(crate) fn header(&self) -> &RingBufferHeader {
        unsafe { self.region.get::<RingBufferHeader>(0) }
    }

    #[inline]
    pub(crate) fn data(&self) -> &RingData {
        &self.data
    }

    /// Total region size, header included.
    #[inline]
    pub fn ring_size(&self) -> u32 {
        self.ring_size
    }

    /// Bytes available for packets and trailers.
    #[inline]
    pub fn datasize(&self) -> u32 {
        self.datasize
    }

    #[inline]
    pub fn features(&self) -> FeatureBits {
        self.header().features()
    }

    /// Snapshot of the shared indices.
    #[inline]
    pub fn indices(&self) -> IndexSnapshot {
        IndexSnapshot::load(self.header(), self.datasize)
    }

    #[inline]
    pub fn bytes_available(&self) -> Avail {
        self.indices().bytes_available()
    }

    /// True if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices().is_empty()
    }

    /// Snapshot of the ring state for diagnostics.
    pub fn debug_info(&self) -> DebugInfo {
        let header = self.header();
        let snapshot = self.indices();
        let avail = snapshot.bytes_available();
        DebugInfo {
            bytes_avail_to_read: avail.to_read,
            bytes_avail_to_write: avail.to_write,
            current_read_index: snapshot.read_index,
            current_write_index: snapshot.write_index,
            current_interrupt_mask: header.interrupt_mask.load(Ordering::Acquire),
        }
    }

    /// Consumer: start a drain pass. Producers stop signaling until
    /// [`end_read`](Self::end_read).
    pub fn begin_read(&self) {
        self.header().interrupt_mask.store(1, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    /// Consumer: finish a drain pass.
    ///
    /// Clears the interrupt mask and returns the bytes still waiting. A
    /// nonzero result means a producer wrote while the mask was set and did
    /// not signal; the consumer must drain again.
    pub fn end_read(&self) -> u32 {
        self.header().interrupt_mask.store(0, Ordering::Relaxed);
        // Order the mask store before the write_index load; pairs with the
        // fence in need_signal_after_write.
        fence(Ordering::SeqCst);
        self.bytes_available().to_read
    }

    /// Producer: advertise that the next write needs `bytes` of free space.
    ///
    /// After this returns, re-check [`bytes_available`](Self::bytes_available)
    /// before blocking. Space freed before the store is visible there, and
    /// space freed after it makes the consumer signal.
    pub fn set_pending_send_sz(&self, bytes: u32) {
        self.header().pending_send_sz.store(bytes, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    /// Producer: no longer waiting for space.
    pub fn clear_pending_send_sz(&self) {
        self.header().pending_send_sz.store(0, Ordering::Release);
    }

    #[inline]
    pub fn pending_send_sz(&self) -> u32 {
        self.header().pending_send_sz.load(Ordering::Acquire)
    }
}

fn check_region(region: Region, config: &RingConfig) -> Result<(u32, u32), RingError> {
    if HEADER_SIZE != config.page_size {
        return Err(RingError::SizeMismatch {
            expected: config.page_size,
            found: HEADER_SIZE,
        });
    }
    if region.len() <= HEADER_SIZE {
        return Err(RingError::RegionTooSmall {
            required: HEADER_SIZE + 1,
            found: region.len(),
        });
    }
    let Ok(ring_size) = u32::try_from(region.len()) else {
        return Err(RingError::InvalidArgument(
            "region larger than the 32-bit index space",
        ));
    };
    if !(region.as_ptr() as usize).is_multiple_of(align_of::<RingBufferHeader>()) {
        return Err(RingError::InvalidArgument("region misaligned for ring header"));
    }
    Ok((ring_size, ring_size - HEADER_SIZE as u32))
}

/// Diagnostic snapshot of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugInfo {
    pub bytes_avail_to_read: u32,
    pub bytes_avail_to_write: u32,
    pub current_read_index: u32,
    pub current_write_index: u32,
    pub current_interrupt_mask: u32,
}

impl std::fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "read={} write={} to_read={} to_write={} mask={}",
            self.current_read_index,
            self.current_write_index,
            self.bytes_avail_to_read,
            self.bytes_avail_to_write,
            self.current_interrupt_mask
        )
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::region::HeapRegion;

    #[test]
    fn init_sets_up_empty_ring() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + 64);
        let ring = unsafe { RingBuffer::init(owner.region()) }.unwrap();
        assert_eq!(ring.ring_size(), PAGE_SIZE as u32 + 64);
        assert_eq!(ring.datasize(), 64);
        assert!(ring.is_empty());
        assert_eq!(ring.features(), FeatureBits::PENDING_SEND_SZ);
        assert_eq!(
            ring.debug_info(),
            DebugInfo {
                bytes_avail_to_read: 0,
                bytes_avail_to_write: 64,
                current_read_index: 0,
                current_write_index: 0,
                current_interrupt_mask: 0,
            }
        );
    }

    #[test]
    fn init_resets_stale_header() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + 64);
        unsafe {
            let region = owner.region();
            let header = region.get::<RingBufferHeader>(0);
            header.write_index.store(17, Ordering::Relaxed);
            header.interrupt_mask.store(1, Ordering::Relaxed);
        }
        let ring = unsafe { RingBuffer::init(owner.region()) }.unwrap();
        assert_eq!(ring.indices().write_index, 0);
        assert_eq!(ring.debug_info().current_interrupt_mask, 0);
    }

    #[test]
    fn header_size_must_match_page_size() {
        let owner = HeapRegion::new_zeroed(3 * PAGE_SIZE);
        let config = RingConfig {
            page_size: 2 * PAGE_SIZE,
            ..RingConfig::default()
        };
        let err = unsafe { RingBuffer::init_with(owner.region(), &config) }.err();
        assert_eq!(
            err,
            Some(RingError::SizeMismatch {
                expected: 2 * PAGE_SIZE,
                found: PAGE_SIZE,
            })
        );
    }

    #[test]
    fn region_must_leave_room_for_data() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE);
        let err = unsafe { RingBuffer::init(owner.region()) }.err();
        assert_eq!(
            err,
            Some(RingError::RegionTooSmall {
                required: PAGE_SIZE + 1,
                found: PAGE_SIZE,
            })
        );
    }

    #[test]
    fn attach_sees_initialized_features() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + 128);
        let config = RingConfig {
            features: FeatureBits::empty(),
            ..RingConfig::default()
        };
        let producer = unsafe { RingBuffer::init_with(owner.region(), &config) }.unwrap();
        let consumer = unsafe { RingBuffer::attach(owner.region()) }.unwrap();
        assert!(consumer.features().is_empty());
        assert_eq!(consumer.datasize(), producer.datasize());
        producer.cleanup();
        consumer.cleanup();
    }

    #[test]
    fn cleanup_leaves_shared_state_to_the_peer() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + 64);
        let mut producer = unsafe { RingBuffer::init(owner.region()) }.unwrap();
        let consumer = unsafe { RingBuffer::attach(owner.region()) }.unwrap();
        producer.write(&[b"bye"]).unwrap();
        producer.cleanup();
        assert_eq!(consumer.bytes_available().to_read, 3 + 8);
    }

    #[test]
    fn drain_bracket_toggles_mask() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + 64);
        let ring = unsafe { RingBuffer::init(owner.region()) }.unwrap();
        ring.begin_read();
        assert_eq!(ring.debug_info().current_interrupt_mask, 1);
        assert_eq!(ring.end_read(), 0);
        assert_eq!(ring.debug_info().current_interrupt_mask, 0);
    }

    #[test]
    fn pending_send_round_trip() {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + 64);
        let ring = unsafe { RingBuffer::init(owner.region()) }.unwrap();
        ring.set_pending_send_sz(40);
        assert_eq!(ring.pending_send_sz(), 40);
        ring.clear_pending_send_sz();
        assert_eq!(ring.pending_send_sz(), 0);
    }

    #[test]
    fn debug_info_display() {
        let info = DebugInfo {
            bytes_avail_to_read: 28,
            bytes_avail_to_write: 36,
            current_read_index: 0,
            current_write_index: 28,
            current_interrupt_mask: 0,
        };
        assert_eq!(
            info.to_string(),
            "read=0 write=28 to_read=28 to_write=36 mask=0"
        );
    }
}
