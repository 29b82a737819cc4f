/// Errors that can occur while framing or deframing packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first header byte does not match the protocol version.
    ///
    /// Fatal for the connection: the byte stream is no longer trustworthy.
    #[error("packet version mismatch (expected {expected}, found {found})")]
    VersionMismatch { expected: u8, found: u8 },

    /// The header declares a payload at or above the maximum payload bound.
    ///
    /// No legitimate encoder produces such a length, so the stream is
    /// treated as corrupt rather than waiting for bytes that cannot form a
    /// legal packet.
    #[error("declared payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The 16-bit length field disagrees with the actual byte count.
    #[error("packet length mismatch (header declares {declared}, buffer holds {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// A packet must carry at least one payload byte.
    #[error("packet carries no payload")]
    EmptyPayload,

    /// The caller-supplied buffer cannot hold the whole packet.
    #[error("buffer too small for packet ({needed} bytes needed, {len} available)")]
    BufferTooSmall { needed: usize, len: usize },

    /// An I/O error occurred on the underlying byte source or sink.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source or sink closed before the stream was done.
    #[error("stream closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
