//! Index arithmetic over a snapshot of the shared indices.

use crate::layout::RingBufferHeader;
use crate::sync::Ordering;

/// Bytes available in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avail {
    pub to_read: u32,
    pub to_write: u32,
}

/// A point-in-time copy of the read and write indices.
///
/// All arithmetic happens on the snapshot; nothing here touches shared memory
/// after [`IndexSnapshot::load`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub write_index: u32,
    pub read_index: u32,
    pub datasize: u32,
}

impl IndexSnapshot {
    /// Build a snapshot from explicit values.
    ///
    /// Indices are reduced modulo `datasize`.
    ///
    /// # Panics
    ///
    /// Panics if `datasize` is zero.
    #[inline]
    pub fn new(write_index: u32, read_index: u32, datasize: u32) -> Self {
        assert!(datasize > 0, "datasize must be > 0");
        Self {
            write_index: write_index % datasize,
            read_index: read_index % datasize,
            datasize,
        }
    }

    /// Load both indices with acquire ordering.
    ///
    /// A peer can store anything into the shared header, so the loaded values
    /// are reduced modulo `datasize` and can never address outside the data
    /// area.
    #[inline]
    pub fn load(header: &RingBufferHeader, datasize: u32) -> Self {
        let read_index = header.read_index.load(Ordering::Acquire);
        let write_index = header.write_index.load(Ordering::Acquire);
        Self::new(write_index, read_index, datasize)
    }

    #[inline]
    pub fn next_write_location(&self) -> u32 {
        self.write_index
    }

    #[inline]
    pub fn next_read_location(&self) -> u32 {
        self.read_index
    }

    /// The read index advanced by `offset`, wrapped into the data area.
    #[inline]
    pub fn read_location_with_offset(&self, offset: u32) -> u32 {
        ((self.read_index as u64 + offset as u64) % self.datasize as u64) as u32
    }

    #[inline]
    pub fn bytes_available(&self) -> Avail {
        let to_read = bytes_to_read(self.write_index, self.read_index, self.datasize);
        Avail {
            to_read,
            to_write: self.datasize - to_read,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_index == self.read_index
    }
}

/// Unread bytes between `read_index` and `write_index`.
#[inline]
pub fn bytes_to_read(write_index: u32, read_index: u32, datasize: u32) -> u32 {
    if write_index >= read_index {
        write_index - read_index
    } else {
        datasize - (read_index - write_index)
    }
}

/// Free bytes between `write_index` and `read_index`.
#[inline]
pub fn bytes_to_write(write_index: u32, read_index: u32, datasize: u32) -> u32 {
    datasize - bytes_to_read(write_index, read_index, datasize)
}
