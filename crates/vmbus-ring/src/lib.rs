//! Byte-oriented ring buffer for shared-memory channels.
//!
//! Two endpoints (a guest and a host, or two processes) share one region: a
//! page-sized [`RingBufferHeader`] followed by a circular data area. One
//! endpoint writes length-framed packets, the other reads them. There is no
//! lock between the endpoints; the indices are atomics and every cross-side
//! handoff is ordered with fences.
//!
//! Notifications are expensive, so both operations report whether the other
//! side actually needs one:
//!
//! - [`RingBuffer::write`] returns `true` only when the ring went from empty
//!   to non-empty while the reader was not draining.
//! - [`RingBuffer::read`] sets [`ReadOutcome::signal`] only when a producer
//!   blocked on `pending_send_sz` bytes can now proceed.
//!
//! Delivering the notification is the caller's job.
//!
//! # Example
//!
//! ```
//! use vmbus_ring::{HeapRegion, PAGE_SIZE, PacketBuilder, PacketType, RingBuffer};
//!
//! let owner = HeapRegion::new_zeroed(PAGE_SIZE + 4096);
//! let mut producer = unsafe { RingBuffer::init(owner.region()) }.unwrap();
//! let mut consumer = unsafe { RingBuffer::attach(owner.region()) }.unwrap();
//!
//! let framed = PacketBuilder::new(PacketType::DataInband, b"ping")
//!     .transaction_id(1)
//!     .build()
//!     .unwrap();
//! let should_signal = producer.write(&framed.segments()).unwrap();
//! assert!(should_signal);
//!
//! let mut buf = [0u8; 64];
//! let outcome = consumer.read(&mut buf).unwrap();
//! assert_eq!(outcome.transaction_id, 1);
//! assert_eq!(&buf[..4], b"ping");
//! ```
//!
//! # Loom Testing
//!
//! Enable the `loom` feature to model-check the signaling protocol.
//!
//! ```text
//! cargo test -p vmbus-ring --features loom --release
//! ```

pub mod copy;
pub mod error;
pub mod index;
pub mod layout;
pub mod packet;
mod reader;
pub mod region;
pub mod ring;
pub mod signal;
pub mod sync;
mod writer;

pub use copy::RingData;
pub use error::RingError;
pub use index::{Avail, IndexSnapshot};
pub use layout::{FeatureBits, HEADER_SIZE, PAGE_SIZE, RingBufferHeader};
pub use packet::{
    DESCRIPTOR_SIZE, FrameError, FramedPacket, PacketBuilder, PacketDescriptor, PacketFlags,
    PacketType, TRAILER_SIZE, UnknownPacketType,
};
pub use reader::ReadOutcome;
pub use region::{HeapRegion, Region};
pub use ring::{DebugInfo, RingBuffer, RingConfig};
pub use signal::{need_signal_after_write, need_signal_on_read};
