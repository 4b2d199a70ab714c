//! Treats the producer side as untrusted: arbitrary unframed bytes and
//! arbitrary index values. The consumer must never panic, never step outside
//! the data area, and never move on a failed read.

use std::sync::atomic::Ordering;

use vmbus_ring::{HeapRegion, PAGE_SIZE, RingBuffer, RingBufferHeader, RingError, TRAILER_SIZE};

#[derive(Clone, Debug)]
pub enum HostileOp {
    /// Write raw bytes with no packet framing.
    Write(Vec<u8>),
    Read { buf_len: u16 },
    RawRead { buf_len: u16 },
    SetWriteIndex(u32),
    SetReadIndex(u32),
}

impl HostileOp {
    /// Decode a fuzzer tuple into an operation.
    pub fn from_parts(tag: u8, value: u32, bytes: Vec<u8>) -> Self {
        match tag % 5 {
            0 => HostileOp::Write(bytes),
            1 => HostileOp::Read {
                buf_len: value as u16,
            },
            2 => HostileOp::RawRead {
                buf_len: value as u16,
            },
            3 => HostileOp::SetWriteIndex(value),
            _ => HostileOp::SetReadIndex(value),
        }
    }
}

fn header(owner: &HeapRegion) -> &RingBufferHeader {
    unsafe { owner.region().get(0) }
}

fn read_and_verify(
    consumer: &mut RingBuffer,
    i: usize,
    buf_len: u16,
    raw: bool,
) -> Result<(), String> {
    let datasize = consumer.datasize();
    let before = consumer.indices();
    let info = consumer.debug_info();
    let mut dest = vec![0u8; buf_len as usize];

    let result = if raw {
        consumer.read_raw(&mut dest)
    } else {
        consumer.read(&mut dest)
    };

    match result {
        Ok(outcome) => match outcome.descriptor {
            None => {
                if consumer.indices() != before {
                    return Err(format!("op {i}: empty read moved the indices"));
                }
            }
            Some(desc) => {
                if outcome.len as usize > dest.len() {
                    return Err(format!(
                        "op {i}: read {} bytes into a {}-byte buffer",
                        outcome.len,
                        dest.len()
                    ));
                }
                let consumed = desc.total_len() as u64 + TRAILER_SIZE as u64;
                let expected = (before.read_index as u64 + consumed) % datasize as u64;
                let after = consumer.indices();
                if after.read_index as u64 != expected {
                    return Err(format!(
                        "op {i}: read_index {} -> {} but packet spans {consumed} bytes",
                        before.read_index, after.read_index
                    ));
                }
                if consumed > before.bytes_available().to_read as u64 {
                    return Err(format!("op {i}: consumed more than was published"));
                }
            }
        },
        Err(
            RingError::WouldBlock
            | RingError::BufferTooSmall { .. }
            | RingError::MalformedPacket { .. }
            | RingError::InvalidArgument(_),
        ) => {
            if consumer.debug_info() != info {
                return Err(format!("op {i}: failed read changed ring state"));
            }
        }
        Err(e) => return Err(format!("op {i}: unexpected error {e}")),
    }
    Ok(())
}

/// Execute a hostile sequence and verify the consumer's guarantees.
pub fn execute_and_verify(datasize: u32, ops: &[HostileOp]) -> Result<(), String> {
    let owner = HeapRegion::new_zeroed(PAGE_SIZE + datasize as usize);
    let mut producer = unsafe { RingBuffer::init(owner.region()) }
        .map_err(|e| format!("init failed: {e}"))?;
    let mut consumer = unsafe { RingBuffer::attach(owner.region()) }
        .map_err(|e| format!("attach failed: {e}"))?;
    let shared = header(&owner);

    for (i, op) in ops.iter().enumerate() {
        match op {
            HostileOp::Write(bytes) => {
                let free = producer.bytes_available().to_write as u64;
                let need = bytes.len() as u64 + TRAILER_SIZE as u64;
                match producer.write(&[bytes.as_slice()]) {
                    Ok(_) if free > need => {}
                    Err(RingError::WouldBlock) if free <= need => {}
                    other => {
                        return Err(format!(
                            "op {i}: raw write of {need} bytes with {free} free returned {other:?}"
                        ));
                    }
                }
            }
            HostileOp::Read { buf_len } => read_and_verify(&mut consumer, i, *buf_len, false)?,
            HostileOp::RawRead { buf_len } => read_and_verify(&mut consumer, i, *buf_len, true)?,
            HostileOp::SetWriteIndex(value) => shared.write_index.store(*value, Ordering::Release),
            HostileOp::SetReadIndex(value) => shared.read_index.store(*value, Ordering::Release),
        }

        for ring in [&producer, &consumer] {
            let snapshot = ring.indices();
            if snapshot.write_index >= datasize || snapshot.read_index >= datasize {
                return Err(format!("after op {i}: index escaped the data area"));
            }
            let avail = snapshot.bytes_available();
            if avail.to_read + avail.to_write != datasize {
                return Err(format!(
                    "after op {i}: to_read={} to_write={} for datasize {datasize}",
                    avail.to_read, avail.to_write
                ));
            }
        }
    }

    Ok(())
}
