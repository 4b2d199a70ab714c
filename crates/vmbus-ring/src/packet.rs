//! Packet framing.
//!
//! ```text
//! ┌────────────────────┬──────────────────┬─────────┬─────────┬──────────┐
//! │ descriptor (16 B)  │ extended header  │ payload │ padding │ trailer  │
//! │ type|off8|len8|flg │ (optional, 8k B) │         │ to 8 B  │ (8 B)    │
//! │ trans_id           │                  │         │         │          │
//! └────────────────────┴──────────────────┴─────────┴─────────┴──────────┘
//!  <──────────── offset8 * 8 ────────────>
//!  <──────────────────────── len8 * 8 ──────────────────────>
//! ```
//!
//! The trailer is appended by the writer and holds the write index at which
//! the packet starts, shifted into the upper 32 bits.

use bitflags::bitflags;
use std::fmt;

/// Size of the on-wire packet descriptor.
pub const DESCRIPTOR_SIZE: usize = 16;

/// Size of the trailer that follows every packet.
pub const TRAILER_SIZE: usize = 8;

/// Granularity of `offset8` and `len8`.
pub const PACKET_ALIGN: usize = 8;

/// Largest total packet length `len8` can describe.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize * PACKET_ALIGN;

static ZERO_PAD: [u8; PACKET_ALIGN] = [0; PACKET_ALIGN];

/// Packet type tag carried in the descriptor.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketType {
    Invalid = 0,
    Synch = 1,
    AddTransferPageSet = 2,
    RemoveTransferPageSet = 3,
    EstablishGpadl = 4,
    TeardownGpadl = 5,
    DataInband = 6,
    DataUsingTransferPages = 7,
    DataUsingGpadl = 8,
    DataUsingGpaDirect = 9,
    CancelRequest = 10,
    Completion = 11,
    DataUsingAdditionalPacket = 12,
    AdditionalData = 13,
}

impl TryFrom<u16> for PacketType {
    type Error = UnknownPacketType;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => PacketType::Invalid,
            1 => PacketType::Synch,
            2 => PacketType::AddTransferPageSet,
            3 => PacketType::RemoveTransferPageSet,
            4 => PacketType::EstablishGpadl,
            5 => PacketType::TeardownGpadl,
            6 => PacketType::DataInband,
            7 => PacketType::DataUsingTransferPages,
            8 => PacketType::DataUsingGpadl,
            9 => PacketType::DataUsingGpaDirect,
            10 => PacketType::CancelRequest,
            11 => PacketType::Completion,
            12 => PacketType::DataUsingAdditionalPacket,
            13 => PacketType::AdditionalData,
            _ => return Err(UnknownPacketType(v)),
        })
    }
}

impl From<PacketType> for u16 {
    fn from(ty: PacketType) -> u16 {
        ty as u16
    }
}

/// A packet type tag outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownPacketType(pub u16);

impl fmt::Display for UnknownPacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown packet type: {}", self.0)
    }
}

impl std::error::Error for UnknownPacketType {}

bitflags! {
    /// Descriptor flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u16 {
        /// The sender wants a completion packet echoing `trans_id`.
        const COMPLETION_REQUESTED = 1 << 0;
    }
}

/// Fixed-size descriptor at the start of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDescriptor {
    pub packet_type: u16,
    /// Payload offset from the start of the packet, in 8-byte units.
    pub offset8: u16,
    /// Total packet length excluding the trailer, in 8-byte units.
    pub len8: u16,
    pub flags: u16,
    pub trans_id: u64,
}

impl PacketDescriptor {
    /// Encode as little-endian wire bytes.
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut out = [0u8; DESCRIPTOR_SIZE];
        out[0..2].copy_from_slice(&self.packet_type.to_le_bytes());
        out[2..4].copy_from_slice(&self.offset8.to_le_bytes());
        out[4..6].copy_from_slice(&self.len8.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.trans_id.to_le_bytes());
        out
    }

    /// Decode from little-endian wire bytes.
    pub fn from_bytes(bytes: &[u8; DESCRIPTOR_SIZE]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let mut trans_id = [0u8; 8];
        trans_id.copy_from_slice(&bytes[8..16]);
        Self {
            packet_type: u16_at(0),
            offset8: u16_at(2),
            len8: u16_at(4),
            flags: u16_at(6),
            trans_id: u64::from_le_bytes(trans_id),
        }
    }

    /// Payload offset in bytes.
    #[inline]
    pub fn payload_offset(&self) -> u32 {
        self.offset8 as u32 * PACKET_ALIGN as u32
    }

    /// Packet length in bytes, trailer excluded.
    #[inline]
    pub fn total_len(&self) -> u32 {
        self.len8 as u32 * PACKET_ALIGN as u32
    }

    #[inline]
    pub fn kind(&self) -> Result<PacketType, UnknownPacketType> {
        PacketType::try_from(self.packet_type)
    }

    #[inline]
    pub fn packet_flags(&self) -> PacketFlags {
        PacketFlags::from_bits_truncate(self.flags)
    }
}

/// Trailer value for a packet starting at `write_index`.
#[inline]
pub fn prev_indices(write_index: u32) -> u64 {
    (write_index as u64) << 32
}

/// Start offset of the packet a trailer belongs to.
#[inline]
pub fn trailer_write_index(trailer: u64) -> u32 {
    (trailer >> 32) as u32
}

/// Errors from building a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Extended header length is not a multiple of 8.
    MisalignedHeader { len: usize },
    /// The framed packet does not fit in `len8`.
    TooLarge { len: usize, max: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MisalignedHeader { len } => {
                write!(
                    f,
                    "extended header length {} is not a multiple of {}",
                    len, PACKET_ALIGN
                )
            }
            Self::TooLarge { len, max } => {
                write!(f, "packet too large: {} bytes, max {}", len, max)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Builds a framed packet from a payload and descriptor fields.
#[derive(Debug, Clone, Copy)]
pub struct PacketBuilder<'a> {
    packet_type: PacketType,
    flags: PacketFlags,
    trans_id: u64,
    header: &'a [u8],
    payload: &'a [u8],
}

impl<'a> PacketBuilder<'a> {
    pub fn new(packet_type: PacketType, payload: &'a [u8]) -> Self {
        Self {
            packet_type,
            flags: PacketFlags::empty(),
            trans_id: 0,
            header: &[],
            payload,
        }
    }

    pub fn flags(mut self, flags: PacketFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn transaction_id(mut self, trans_id: u64) -> Self {
        self.trans_id = trans_id;
        self
    }

    /// Bytes placed between the descriptor and the payload. A reader in
    /// non-raw mode skips them.
    pub fn extended_header(mut self, header: &'a [u8]) -> Self {
        self.header = header;
        self
    }

    pub fn build(self) -> Result<FramedPacket<'a>, FrameError> {
        if !self.header.len().is_multiple_of(PACKET_ALIGN) {
            return Err(FrameError::MisalignedHeader {
                len: self.header.len(),
            });
        }

        let offset = DESCRIPTOR_SIZE + self.header.len();
        let unpadded = offset + self.payload.len();
        let total = unpadded.next_multiple_of(PACKET_ALIGN);
        if total > MAX_PACKET_LEN {
            return Err(FrameError::TooLarge {
                len: total,
                max: MAX_PACKET_LEN,
            });
        }

        let descriptor = PacketDescriptor {
            packet_type: self.packet_type.into(),
            offset8: (offset / PACKET_ALIGN) as u16,
            len8: (total / PACKET_ALIGN) as u16,
            flags: self.flags.bits(),
            trans_id: self.trans_id,
        };

        Ok(FramedPacket {
            descriptor,
            descriptor_bytes: descriptor.to_bytes(),
            header: self.header,
            payload: self.payload,
            padding: total - unpadded,
        })
    }
}

/// A packet ready to hand to the writer as scattered segments.
#[derive(Debug, Clone)]
pub struct FramedPacket<'a> {
    descriptor: PacketDescriptor,
    descriptor_bytes: [u8; DESCRIPTOR_SIZE],
    header: &'a [u8],
    payload: &'a [u8],
    padding: usize,
}

impl<'a> FramedPacket<'a> {
    #[inline]
    pub fn descriptor(&self) -> &PacketDescriptor {
        &self.descriptor
    }

    /// Descriptor, extended header, payload, padding, in write order.
    pub fn segments(&self) -> [&[u8]; 4] {
        [
            &self.descriptor_bytes,
            self.header,
            self.payload,
            &ZERO_PAD[..self.padding],
        ]
    }

    /// Bytes the packet occupies in the ring, trailer included.
    #[inline]
    pub fn ring_len(&self) -> usize {
        self.descriptor.total_len() as usize + TRAILER_SIZE
    }
}
