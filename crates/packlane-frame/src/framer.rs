use bytes::BytesMut;

use crate::error::{FrameError, Result};
use crate::packet::{declared_payload_len, Packet, HEADER_SIZE, PAYLOAD_CAPACITY, VERSION};

const INITIAL_BUFFER_CAPACITY: usize = crate::packet::MAX_PACKET_SIZE;

/// Segments a raw byte stream into discrete packets.
///
/// Bytes arrive via [`push`](Self::push) in fragments of any size — a single
/// read may carry half a header or three packets and change. [`pull`](Self::pull)
/// yields at most one complete [`Packet`] per call, in push order. One framer
/// per connection; it is never shared.
///
/// The unconsumed region always starts at a packet boundary: either the
/// buffer is empty or offset 0 is the first byte of an undecided packet.
#[derive(Debug)]
pub struct PacketFramer {
    buf: BytesMut,
}

impl PacketFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append raw stream bytes. No validation happens here; the buffer grows
    /// past its initial capacity if needed.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Try to extract one packet from the front of the buffer.
    ///
    /// `Ok(None)` means "no packet yet" — the expected steady state between
    /// reads, not an error. An `Err` means the stream violated the protocol
    /// (wrong version, impossible length); the framer's state past that
    /// offset is no longer trustworthy and the caller must stop pulling.
    pub fn pull(&mut self) -> Result<Option<Packet>> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        if self.buf[0] != VERSION {
            return Err(FrameError::VersionMismatch {
                expected: VERSION,
                found: self.buf[0],
            });
        }

        let payload_len = declared_payload_len(&self.buf);
        if payload_len >= PAYLOAD_CAPACITY {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: PAYLOAD_CAPACITY - 1,
            });
        }

        // A packet carries at least one payload byte, so nothing shorter
        // than HEADER_SIZE + 1 can ever be complete.
        let total = HEADER_SIZE + payload_len;
        if self.buf.len() < total.max(HEADER_SIZE + 1) {
            return Ok(None);
        }

        let raw = self.buf.split_to(total).freeze();
        Packet::from_bytes(raw).map(Some)
    }

    /// Bytes currently buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}
