use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;

/// Alignment of heap-backed regions. Matches the page granularity that a
/// real shared mapping would have.
const REGION_ALIGN: usize = 4096;

/// A raw view of a shared memory region.
///
/// `Region` does not own its memory. Whoever mapped it (an mmap, a hypervisor
/// grant, a [`HeapRegion`] in tests) keeps it alive for as long as any ring
/// handle built on top of it.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    base: NonNull<u8>,
    len: usize,
}

unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Wrap a raw pointer and length.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `len` bytes for as long as
    /// the region (or anything built from it) is used.
    #[inline]
    pub unsafe fn from_raw(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Pointer to `offset` bytes into the region.
    #[inline]
    pub fn offset(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.len);
        unsafe { self.base.as_ptr().add(offset) }
    }

    /// Reinterpret the bytes at `offset` as a `T`.
    ///
    /// The reference is not tied to this `Region` value, which is only a
    /// copyable view; it lives as long as the caller says the mapping does.
    ///
    /// # Safety
    ///
    /// `offset + size_of::<T>()` must be within the region, the address must
    /// be aligned for `T`, and the bytes must hold a valid `T`. The mapping
    /// must outlive `'a`.
    #[inline]
    pub unsafe fn get<'a, T>(&self, offset: usize) -> &'a T {
        debug_assert!(offset + size_of::<T>() <= self.len);
        unsafe { &*(self.offset(offset) as *const T) }
    }
}

/// A zeroed, heap-allocated region that owns its memory.
///
/// Stands in for a shared mapping in tests and in single-process use.
pub struct HeapRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    /// Allocate `size` zeroed bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or the allocation fails.
    pub fn new_zeroed(size: usize) -> Self {
        assert!(size > 0, "region size must be > 0");
        let layout = Layout::from_size_align(size, REGION_ALIGN).expect("invalid region layout");
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            std::alloc::handle_alloc_error(layout);
        };
        Self { ptr, layout }
    }

    /// Borrow the allocation as a [`Region`].
    #[inline]
    pub fn region(&self) -> Region {
        unsafe { Region::from_raw(self.ptr, self.layout.size()) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
