//! Drives a producer/consumer pair through a random sequence of operations
//! and checks it against a queue of expected packets.

use std::collections::VecDeque;

use vmbus_ring::{HeapRegion, PAGE_SIZE, PacketBuilder, PacketType, RingBuffer, RingError};

pub const MIN_DATASIZE: u32 = 64;
pub const MAX_DATASIZE: u32 = 4096;

/// Operations that can be performed on the ring.
#[derive(Clone, Copy, Debug)]
pub enum RingOp {
    /// Frame and write a packet with `len` bytes of payload.
    Write { len: u8, trans_id: u64 },
    /// Read into a buffer of `buf_len` bytes.
    Read { buf_len: u16 },
    SetPending(u16),
    ClearPending,
}

#[derive(Debug)]
struct Expected {
    trans_id: u64,
    fill: u8,
    len: usize,
    padded: usize,
    ring_len: u32,
}

struct Harness {
    _owner: HeapRegion,
    producer: RingBuffer,
    consumer: RingBuffer,
    datasize: u32,
    queue: VecDeque<Expected>,
    used: u32,
    pending: u32,
}

impl Harness {
    fn new(datasize: u32) -> Result<Self, String> {
        let owner = HeapRegion::new_zeroed(PAGE_SIZE + datasize as usize);
        let producer = unsafe { RingBuffer::init(owner.region()) }
            .map_err(|e| format!("init failed: {e}"))?;
        let consumer = unsafe { RingBuffer::attach(owner.region()) }
            .map_err(|e| format!("attach failed: {e}"))?;
        Ok(Self {
            _owner: owner,
            producer,
            consumer,
            datasize,
            queue: VecDeque::new(),
            used: 0,
            pending: 0,
        })
    }

    fn free(&self) -> u32 {
        self.datasize - self.used
    }

    fn write(&mut self, i: usize, len: u8, trans_id: u64) -> Result<(), String> {
        let fill = trans_id as u8;
        let payload = vec![fill; len as usize];
        let framed = PacketBuilder::new(PacketType::DataInband, &payload)
            .transaction_id(trans_id)
            .build()
            .map_err(|e| format!("op {i}: framing failed: {e}"))?;
        let ring_len = framed.ring_len() as u32;
        let was_empty = self.used == 0;
        let fits = self.free() > ring_len;

        match (self.producer.write(&framed.segments()), fits) {
            (Ok(signal), true) => {
                if signal != was_empty {
                    return Err(format!(
                        "op {i}: write signal={signal} but ring was_empty={was_empty}"
                    ));
                }
                self.queue.push_back(Expected {
                    trans_id,
                    fill,
                    len: len as usize,
                    padded: (len as usize).next_multiple_of(8),
                    ring_len,
                });
                self.used += ring_len;
                Ok(())
            }
            (Err(RingError::WouldBlock), false) => Ok(()),
            (result, fits) => Err(format!(
                "op {i}: write of {ring_len} bytes with {} free returned {result:?} (fits={fits})",
                self.free()
            )),
        }
    }

    fn read(&mut self, i: usize, buf_len: u16) -> Result<(), String> {
        let mut dest = vec![0xA5u8; buf_len as usize];
        let result = self.consumer.read(&mut dest);

        if buf_len == 0 {
            return match result {
                Err(RingError::InvalidArgument(_)) => Ok(()),
                other => Err(format!("op {i}: empty buffer returned {other:?}")),
            };
        }

        let Some(front) = self.queue.front() else {
            return match result {
                Ok(outcome) if outcome.is_none() && outcome.len == 0 && !outcome.signal => Ok(()),
                other => Err(format!("op {i}: empty ring returned {other:?}")),
            };
        };

        if front.padded > dest.len() {
            let want = RingError::BufferTooSmall {
                required: front.padded as u32,
                available: dest.len(),
            };
            return match result {
                Err(e) if e == want => Ok(()),
                other => Err(format!("op {i}: expected {want:?}, got {other:?}")),
            };
        }

        let outcome = result.map_err(|e| format!("op {i}: read failed: {e}"))?;
        if outcome.transaction_id != front.trans_id {
            return Err(format!(
                "op {i}: read trans_id {} but expected {}",
                outcome.transaction_id, front.trans_id
            ));
        }
        if outcome.len as usize != front.padded {
            return Err(format!(
                "op {i}: read {} bytes but expected {}",
                outcome.len, front.padded
            ));
        }
        if dest[..front.len].iter().any(|&b| b != front.fill) {
            return Err(format!("op {i}: payload corrupted"));
        }
        if dest[front.len..front.padded].iter().any(|&b| b != 0) {
            return Err(format!("op {i}: padding not zeroed"));
        }

        let ring_len = front.ring_len;
        let prev_free = self.free();
        let now_free = prev_free + ring_len;
        let want_signal = self.pending != 0 && prev_free < self.pending && now_free >= self.pending;
        if outcome.signal != want_signal {
            return Err(format!(
                "op {i}: read signal={} but expected {want_signal} (pending={} free {prev_free}->{now_free})",
                outcome.signal, self.pending
            ));
        }

        self.used -= ring_len;
        self.queue.pop_front();
        Ok(())
    }

    fn verify(&self, i: usize) -> Result<(), String> {
        for (side, ring) in [("producer", &self.producer), ("consumer", &self.consumer)] {
            let avail = ring.bytes_available();
            if avail.to_read + avail.to_write != self.datasize {
                return Err(format!(
                    "after op {i}: {side} sees to_read={} to_write={} for datasize {}",
                    avail.to_read, avail.to_write, self.datasize
                ));
            }
            if avail.to_read != self.used {
                return Err(format!(
                    "after op {i}: {side} sees to_read={} but {} bytes are queued",
                    avail.to_read, self.used
                ));
            }
        }
        if self.producer.pending_send_sz() != self.pending {
            return Err(format!("after op {i}: pending_send_sz drifted"));
        }
        if self.consumer.is_empty() != self.queue.is_empty() {
            return Err(format!("after op {i}: emptiness disagrees with model"));
        }
        Ok(())
    }
}

/// Map an arbitrary byte onto a valid data area size.
pub fn datasize_from(byte: u8) -> u32 {
    (MIN_DATASIZE + byte as u32 * 16).min(MAX_DATASIZE)
}

/// Execute a sequence of operations and verify invariants after each one.
pub fn execute_and_verify(datasize: u32, ops: &[RingOp]) -> Result<(), String> {
    let mut harness = Harness::new(datasize)?;

    for (i, op) in ops.iter().enumerate() {
        match *op {
            RingOp::Write { len, trans_id } => harness.write(i, len, trans_id)?,
            RingOp::Read { buf_len } => harness.read(i, buf_len)?,
            RingOp::SetPending(bytes) => {
                harness.producer.set_pending_send_sz(bytes as u32);
                harness.pending = bytes as u32;
            }
            RingOp::ClearPending => {
                harness.producer.clear_pending_send_sz();
                harness.pending = 0;
            }
        }
        harness.verify(i)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_and_drains() {
        let mut ops = Vec::new();
        for id in 0..8 {
            ops.push(RingOp::Write { len: 20, trans_id: id });
        }
        for _ in 0..8 {
            ops.push(RingOp::Read { buf_len: 64 });
        }
        execute_and_verify(128, &ops).unwrap();
    }

    #[test]
    fn mixed_lengths_wrap_many_times() {
        let mut ops = Vec::new();
        for id in 0..64u64 {
            ops.push(RingOp::Write {
                len: (id * 13 % 90) as u8,
                trans_id: id,
            });
            ops.push(RingOp::Read { buf_len: 128 });
        }
        execute_and_verify(200, &ops).unwrap();
    }

    #[test]
    fn pending_threshold_signals_once() {
        let ops = [
            RingOp::Write { len: 16, trans_id: 1 },
            RingOp::Write { len: 16, trans_id: 2 },
            RingOp::Write { len: 16, trans_id: 3 },
            RingOp::SetPending(48),
            RingOp::Read { buf_len: 32 },
            RingOp::Read { buf_len: 32 },
            RingOp::ClearPending,
            RingOp::Read { buf_len: 32 },
        ];
        execute_and_verify(128, &ops).unwrap();
    }

    #[test]
    fn short_buffers_leave_packets_queued() {
        let ops = [
            RingOp::Write { len: 33, trans_id: 9 },
            RingOp::Read { buf_len: 0 },
            RingOp::Read { buf_len: 8 },
            RingOp::Read { buf_len: 40 },
            RingOp::Read { buf_len: 40 },
        ];
        execute_and_verify(128, &ops).unwrap();
    }
}
