//! Copies into and out of the circular data area.

use core::ptr;

/// The data area that follows the ring header.
///
/// Copies split at the physical end of the area and continue at offset 0.
/// Bounds are the caller's job: capacity checks happen before any copy.
#[derive(Debug, Clone, Copy)]
pub struct RingData {
    base: *mut u8,
    len: u32,
}

unsafe impl Send for RingData {}
unsafe impl Sync for RingData {}

impl RingData {
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `len` bytes for the
    /// lifetime of this value, and `len` must be nonzero.
    #[inline]
    pub unsafe fn from_raw(base: *mut u8, len: u32) -> Self {
        debug_assert!(len > 0);
        Self { base, len }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `src` into the ring starting at `offset`, returning the offset just
    /// past the copied bytes.
    ///
    /// # Safety
    ///
    /// `offset < len`, `src.len() <= len`, and the span being written must not
    /// contain unread bytes.
    pub unsafe fn copy_in(&self, offset: u32, src: &[u8]) -> u32 {
        debug_assert!(offset < self.len);
        debug_assert!(src.len() <= self.len as usize);

        let offset_usize = offset as usize;
        let tail = (self.len - offset) as usize;
        unsafe {
            if src.len() > tail {
                ptr::copy_nonoverlapping(src.as_ptr(), self.base.add(offset_usize), tail);
                ptr::copy_nonoverlapping(src.as_ptr().add(tail), self.base, src.len() - tail);
            } else {
                ptr::copy_nonoverlapping(src.as_ptr(), self.base.add(offset_usize), src.len());
            }
        }

        self.advance(offset, src.len())
    }

    /// Fill `dest` from the ring starting at `offset`, returning the offset
    /// just past the copied bytes.
    ///
    /// # Safety
    ///
    /// `offset < len`, `dest.len() <= len`, and the span being read must hold
    /// published bytes.
    pub unsafe fn copy_out(&self, dest: &mut [u8], offset: u32) -> u32 {
        debug_assert!(offset < self.len);
        debug_assert!(dest.len() <= self.len as usize);

        let offset_usize = offset as usize;
        let tail = (self.len - offset) as usize;
        unsafe {
            if dest.len() > tail {
                ptr::copy_nonoverlapping(self.base.add(offset_usize), dest.as_mut_ptr(), tail);
                ptr::copy_nonoverlapping(
                    self.base,
                    dest.as_mut_ptr().add(tail),
                    dest.len() - tail,
                );
            } else {
                ptr::copy_nonoverlapping(
                    self.base.add(offset_usize),
                    dest.as_mut_ptr(),
                    dest.len(),
                );
            }
        }

        self.advance(offset, dest.len())
    }

    #[inline]
    fn advance(&self, offset: u32, by: usize) -> u32 {
        ((offset as u64 + by as u64) % self.len as u64) as u32
    }
}
