/// Errors returned by ring buffer operations.
///
/// Nothing here is logged by the ring itself; every condition is handed back
/// to the caller, and no operation mutates shared state before failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The shared header is not exactly one page.
    SizeMismatch { expected: usize, found: usize },
    /// The region cannot hold the header plus a usable data area.
    RegionTooSmall { required: usize, found: usize },
    /// The caller passed an argument the operation cannot accept.
    InvalidArgument(&'static str),
    /// Not enough free space to write, or the next packet is not fully
    /// published yet. Retry later.
    WouldBlock,
    /// The destination cannot hold the next packet. The packet stays queued.
    BufferTooSmall { required: u32, available: usize },
    /// The descriptor at the read index describes an impossible packet.
    MalformedPacket { offset: u32, len: u32 },
}

impl RingError {
    #[inline]
    pub fn is_would_block(&self) -> bool {
        matches!(self, RingError::WouldBlock)
    }

    /// True for conditions the caller is expected to retry from.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RingError::WouldBlock | RingError::BufferTooSmall { .. }
        )
    }
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SizeMismatch { expected, found } => {
                write!(
                    f,
                    "ring header size mismatch: expected {} bytes, found {}",
                    expected, found
                )
            }
            Self::RegionTooSmall { required, found } => {
                write!(
                    f,
                    "region too small for ring: need {} bytes, got {}",
                    required, found
                )
            }
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::BufferTooSmall {
                required,
                available,
            } => {
                write!(
                    f,
                    "buffer too small: packet needs {} bytes, buffer has {}",
                    required, available
                )
            }
            Self::MalformedPacket { offset, len } => {
                write!(
                    f,
                    "malformed packet descriptor: offset {} bytes, length {} bytes",
                    offset, len
                )
            }
        }
    }
}

impl std::error::Error for RingError {}
