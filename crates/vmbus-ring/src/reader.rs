use crate::error::RingError;
use crate::packet::{DESCRIPTOR_SIZE, PacketDescriptor, TRAILER_SIZE};
use crate::ring::RingBuffer;
use crate::signal::need_signal_on_read;
use crate::sync::{Ordering, fence};

/// Result of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes copied into the destination. Zero when nothing was queued.
    pub len: u32,
    /// `trans_id` from the packet descriptor.
    pub transaction_id: u64,
    /// Whether the producer must be signaled.
    pub signal: bool,
    /// The descriptor of the packet that was read, if any.
    pub descriptor: Option<PacketDescriptor>,
}

impl ReadOutcome {
    const NOTHING: ReadOutcome = ReadOutcome {
        len: 0,
        transaction_id: 0,
        signal: false,
        descriptor: None,
    };

    /// True when no packet was dequeued.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.descriptor.is_none()
    }
}

impl RingBuffer {
    /// Dequeue the next packet's payload into `dest`, skipping the descriptor
    /// and any extended header.
    ///
    /// An empty ring is not an error: the outcome has `len == 0` and no
    /// descriptor. On any error the packet stays queued.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<ReadOutcome, RingError> {
        self.read_packet(dest, false)
    }

    /// Dequeue the next packet whole, descriptor included, for callers that
    /// do their own framing.
    pub fn read_raw(&mut self, dest: &mut [u8]) -> Result<ReadOutcome, RingError> {
        self.read_packet(dest, true)
    }

    fn read_packet(&mut self, dest: &mut [u8], raw: bool) -> Result<ReadOutcome, RingError> {
        if dest.is_empty() {
            return Err(RingError::InvalidArgument("read buffer must not be empty"));
        }

        let snapshot = self.indices();
        let avail = snapshot.bytes_available();
        if (avail.to_read as usize) < DESCRIPTOR_SIZE {
            return Ok(ReadOutcome::NOTHING);
        }

        let data = self.data();
        let mut desc_bytes = [0u8; DESCRIPTOR_SIZE];
        unsafe { data.copy_out(&mut desc_bytes, snapshot.next_read_location()) };
        let desc = PacketDescriptor::from_bytes(&desc_bytes);

        let offset = if raw { 0 } else { desc.payload_offset() };
        let total = desc.total_len();
        let malformed = RingError::MalformedPacket { offset, len: total };
        let Some(packet_len) = total.checked_sub(offset) else {
            return Err(malformed);
        };
        if total as u64 + TRAILER_SIZE as u64 >= self.datasize() as u64 {
            return Err(malformed);
        }

        if (avail.to_read as u64) < total as u64 + TRAILER_SIZE as u64 {
            return Err(RingError::WouldBlock);
        }

        if packet_len as usize > dest.len() {
            return Err(RingError::BufferTooSmall {
                required: packet_len,
                available: dest.len(),
            });
        }

        let mut next = snapshot.read_location_with_offset(offset);
        next = unsafe { data.copy_out(&mut dest[..packet_len as usize], next) };
        let mut trailer = [0u8; TRAILER_SIZE];
        next = unsafe { data.copy_out(&mut trailer, next) };

        // All reads must finish before the producer may reuse the space.
        fence(Ordering::SeqCst);
        self.header().read_index.store(next, Ordering::Release);

        let signal = need_signal_on_read(self.header(), self.datasize(), avail.to_write);

        Ok(ReadOutcome {
            len: packet_len,
            transaction_id: desc.trans_id,
            signal,
            descriptor: Some(desc),
        })
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::layout::PAGE_SIZE;
    use crate::packet::{PacketBuilder, PacketType};
    use crate::region::HeapRegion;

    fn pair(datasize: usize) -> (HeapRegion, RingBuffer, RingBuffer) {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + datasize);
        let producer = unsafe { RingBuffer::init(owner.region()) }.unwrap();
        let consumer = unsafe { RingBuffer::attach(owner.region()) }.unwrap();
        (owner, producer, consumer)
    }

    fn send(producer: &mut RingBuffer, trans_id: u64, payload: &[u8]) -> bool {
        let framed = PacketBuilder::new(PacketType::DataInband, payload)
            .transaction_id(trans_id)
            .build()
            .unwrap();
        producer.write(&framed.segments()).unwrap()
    }

    #[test]
    fn empty_ring_reads_nothing() {
        let (_owner, _producer, mut consumer) = pair(64);
        let mut buf = [0u8; 32];
        let outcome = consumer.read(&mut buf).unwrap();
        assert_eq!(outcome.len, 0);
        assert!(outcome.is_none());
        assert!(!outcome.signal);
    }

    #[test]
    fn zero_length_destination_is_rejected() {
        let (_owner, _producer, mut consumer) = pair(64);
        let err = consumer.read(&mut []).unwrap_err();
        assert!(matches!(err, RingError::InvalidArgument(_)));
    }

    #[test]
    fn read_returns_payload_and_transaction_id() {
        let (_owner, mut producer, mut consumer) = pair(128);
        send(&mut producer, 7, b"payload!");

        let mut buf = [0u8; 64];
        let outcome = consumer.read(&mut buf).unwrap();
        assert_eq!(outcome.len, 8);
        assert_eq!(outcome.transaction_id, 7);
        assert_eq!(&buf[..8], b"payload!");
        assert_eq!(outcome.descriptor.unwrap().kind(), Ok(PacketType::DataInband));
        assert!(consumer.is_empty());
    }

    #[test]
    fn padding_is_part_of_the_payload() {
        let (_owner, mut producer, mut consumer) = pair(128);
        send(&mut producer, 1, b"abc");

        let mut buf = [0xFFu8; 16];
        let outcome = consumer.read(&mut buf).unwrap();
        assert_eq!(outcome.len, 8);
        assert_eq!(&buf[..8], b"abc\0\0\0\0\0");
    }

    #[test]
    fn raw_read_includes_descriptor() {
        let (_owner, mut producer, mut consumer) = pair(128);
        send(&mut producer, 3, b"12345678");

        let mut buf = [0u8; 64];
        let outcome = consumer.read_raw(&mut buf).unwrap();
        assert_eq!(outcome.len, 24);
        let desc = PacketDescriptor::from_bytes(buf[..16].try_into().unwrap());
        assert_eq!(desc.trans_id, 3);
        assert_eq!(&buf[16..24], b"12345678");
    }

    #[test]
    fn small_buffer_leaves_packet_queued() {
        let (_owner, mut producer, mut consumer) = pair(128);
        send(&mut producer, 9, &[5u8; 32]);
        let before = consumer.debug_info();

        let mut small = [0u8; 8];
        let err = consumer.read(&mut small).unwrap_err();
        assert_eq!(
            err,
            RingError::BufferTooSmall {
                required: 32,
                available: 8
            }
        );
        assert_eq!(consumer.debug_info(), before);

        let mut big = [0u8; 32];
        let outcome = consumer.read(&mut big).unwrap();
        assert_eq!(outcome.len, 32);
        assert_eq!(big, [5u8; 32]);
    }

    #[test]
    fn partially_published_packet_would_block() {
        let (_owner, mut producer, mut consumer) = pair(128);
        // A 40-byte packet of which only 8 bytes (plus trailer) were published.
        let desc = PacketDescriptor {
            packet_type: PacketType::DataInband.into(),
            offset8: 2,
            len8: 5,
            flags: 0,
            trans_id: 0,
        };
        producer.write(&[&desc.to_bytes()[..8]]).unwrap();

        let before = consumer.debug_info();
        let mut buf = [0u8; 64];
        assert_eq!(consumer.read(&mut buf).unwrap_err(), RingError::WouldBlock);
        assert_eq!(consumer.debug_info(), before);
    }

    #[test]
    fn packet_is_incomplete_until_its_trailer_is_published() {
        let (_owner, mut producer, mut consumer) = pair(128);
        // 24-byte packet: descriptor plus 8 bytes of payload.
        let desc = PacketDescriptor {
            packet_type: PacketType::DataInband.into(),
            offset8: 2,
            len8: 3,
            flags: 0,
            trans_id: 0,
        };
        // Publish 23 bytes plus the writer's trailer: one byte short of
        // packet and trailer.
        producer.write(&[&desc.to_bytes(), &[0x11; 7]]).unwrap();
        assert_eq!(consumer.bytes_available().to_read, 24 + 7);

        let mut buf = [0u8; 64];
        assert_eq!(consumer.read(&mut buf).unwrap_err(), RingError::WouldBlock);
        assert_eq!(consumer.indices().read_index, 0);
    }

    #[test]
    fn packet_with_trailer_exactly_published_is_read() {
        let (_owner, mut producer, mut consumer) = pair(128);
        let desc = PacketDescriptor {
            packet_type: PacketType::DataInband.into(),
            offset8: 2,
            len8: 3,
            flags: 0,
            trans_id: 4,
        };
        producer.write(&[&desc.to_bytes(), &[0x22; 8]]).unwrap();
        assert_eq!(consumer.bytes_available().to_read, 24 + TRAILER_SIZE as u32);

        let mut buf = [0u8; 64];
        let outcome = consumer.read(&mut buf).unwrap();
        assert_eq!(outcome.len, 8);
        assert_eq!(outcome.transaction_id, 4);
        assert_eq!(&buf[..8], &[0x22; 8]);
        assert!(consumer.is_empty());
    }

    #[test]
    fn malformed_offset_is_rejected() {
        let (_owner, mut producer, mut consumer) = pair(128);
        let desc = PacketDescriptor {
            packet_type: PacketType::DataInband.into(),
            offset8: 4,
            len8: 2,
            flags: 0,
            trans_id: 0,
        };
        producer.write(&[&desc.to_bytes()]).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(
            consumer.read(&mut buf).unwrap_err(),
            RingError::MalformedPacket { offset: 32, len: 16 }
        );
        assert_eq!(consumer.indices().read_index, 0);
    }

    #[test]
    fn wrapped_packet_matches_flat_packet() {
        let payload: Vec<u8> = (0..40u8).collect();

        let (_owner, mut producer, mut consumer) = pair(128);
        let mut buf = [0u8; 64];
        // Push the indices near the end so the next packet straddles it.
        send(&mut producer, 0, &[0u8; 56]);
        consumer.read(&mut buf).unwrap();
        assert_eq!(consumer.indices().read_index, 80);

        send(&mut producer, 1, &payload);
        let wrapped = consumer.read(&mut buf).unwrap();
        assert!(consumer.indices().read_index < 80);

        let (_owner2, mut flat_producer, mut flat_consumer) = pair(128);
        let mut flat_buf = [0u8; 64];
        send(&mut flat_producer, 1, &payload);
        let flat = flat_consumer.read(&mut flat_buf).unwrap();

        assert_eq!(wrapped.len, flat.len);
        assert_eq!(buf[..wrapped.len as usize], flat_buf[..flat.len as usize]);
        assert_eq!(&buf[..40], &payload[..]);
    }

    #[test]
    fn read_signals_once_when_pending_space_frees() {
        let (_owner, mut producer, mut consumer) = pair(128);
        for id in 0..3 {
            send(&mut producer, id, &[0u8; 16]);
        }
        // Three 40-byte packets leave 8 bytes free; the producer wants 48.
        assert_eq!(producer.bytes_available().to_write, 8);
        producer.set_pending_send_sz(48);

        let mut buf = [0u8; 64];
        let signals: Vec<bool> = (0..3)
            .map(|_| consumer.read(&mut buf).unwrap().signal)
            .collect();
        assert_eq!(signals, vec![true, false, false]);
    }

    #[test]
    fn read_below_pending_threshold_does_not_signal() {
        let (_owner, mut producer, mut consumer) = pair(128);
        for id in 0..3 {
            send(&mut producer, id, &[0u8; 16]);
        }
        producer.set_pending_send_sz(100);

        let mut buf = [0u8; 64];
        assert!(!consumer.read(&mut buf).unwrap().signal); // 48 free
        assert!(!consumer.read(&mut buf).unwrap().signal); // 88 free
        assert!(consumer.read(&mut buf).unwrap().signal); // 128 free
    }

    #[test]
    fn no_pending_writer_means_no_signal() {
        let (_owner, mut producer, mut consumer) = pair(128);
        send(&mut producer, 0, b"x");
        let mut buf = [0u8; 64];
        assert!(!consumer.read(&mut buf).unwrap().signal);
    }
}
