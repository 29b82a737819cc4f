use std::fmt;
use std::io::{ErrorKind, Write};

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Protocol version carried in the first header byte.
pub const VERSION: u8 = 1;

/// Packet header: version (1) + type/encoding (1) + payload length (2 BE) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Maximum total wire size of a packet (header + payload).
pub const MAX_PACKET_SIZE: usize = 1024;

/// Payload bytes available in a maximum-size packet buffer.
///
/// A declared length at or above this bound is the oversize sentinel; the
/// largest payload a legal packet carries is [`MAX_PAYLOAD_SIZE`].
pub const PAYLOAD_CAPACITY: usize = MAX_PACKET_SIZE - HEADER_SIZE;

/// Largest legal payload size in bytes.
pub const MAX_PAYLOAD_SIZE: usize = PAYLOAD_CAPACITY - 1;

const TYPE_ENC_INDEX: usize = 1;
const LENGTH_OFFSET: usize = 2;
const TYPE_MASK: u8 = 0x3F;

/// Payload serialization scheme, carried in the high 2 bits of header byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Custom,
    /// Reserved for future use; decoded opaquely, never produced.
    Reserved2,
    /// Reserved for future use; decoded opaquely, never produced.
    Reserved3,
}

impl Encoding {
    /// Decode from the low 2 bits of a value.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Encoding::Json,
            1 => Encoding::Custom,
            2 => Encoding::Reserved2,
            _ => Encoding::Reserved3,
        }
    }

    /// The 2-bit wire value.
    pub fn bits(self) -> u8 {
        match self {
            Encoding::Json => 0,
            Encoding::Custom => 1,
            Encoding::Reserved2 => 2,
            Encoding::Reserved3 => 3,
        }
    }
}

/// Producer contract for payloads that can be packed into a [`Packet`].
///
/// Implementors declare a 6-bit type tag, an encoding tag, and write their
/// payload bytes into the buffer handed to them. The write is infallible by
/// contract; producing more than [`MAX_PAYLOAD_SIZE`] bytes or declaring a
/// type above 63 is a defect in the implementor, not a runtime condition.
pub trait PacketEncoder {
    /// Application-defined 6-bit type tag (0..=62 for application use).
    fn type_tag(&self) -> u8;

    /// Payload serialization scheme.
    fn encoding(&self) -> Encoding;

    /// Write the payload into `buf` and return the number of bytes written.
    ///
    /// `buf` is always [`PAYLOAD_CAPACITY`] bytes long.
    fn write_payload(&self, buf: &mut [u8]) -> usize;
}

/// One complete, header-validated wire message.
///
/// Immutable after construction; the payload is a zero-copy view into the
/// backing buffer.
#[derive(Debug, Clone)]
pub struct Packet {
    raw: Bytes,
}

impl Packet {
    /// Construct from a buffer holding exactly one packet (header + payload).
    ///
    /// Each precondition is a distinct failure: the version byte must equal
    /// [`VERSION`], the packet must carry at least one payload byte, and the
    /// 16-bit length field must match the buffer.
    pub fn from_bytes(raw: Bytes) -> Result<Self> {
        if raw.is_empty() || raw[0] != VERSION {
            return Err(FrameError::VersionMismatch {
                expected: VERSION,
                found: raw.first().copied().unwrap_or(0),
            });
        }

        if raw.len() <= HEADER_SIZE {
            return Err(FrameError::EmptyPayload);
        }

        let declared = declared_payload_len(&raw);
        let actual = raw.len() - HEADER_SIZE;
        if declared != actual {
            return Err(FrameError::LengthMismatch { declared, actual });
        }

        Ok(Self { raw })
    }

    /// Build a packet by pulling payload bytes from an encoder.
    ///
    /// # Panics
    ///
    /// Panics if the encoder produces [`PAYLOAD_CAPACITY`] or more bytes, or
    /// declares a type tag above 63. Both are contract violations by the
    /// payload producer.
    pub fn from_encoder<E: PacketEncoder + ?Sized>(encoder: &E) -> Self {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        let n = encoder.write_payload(&mut buf[HEADER_SIZE..]);
        assert!(
            n < PAYLOAD_CAPACITY,
            "encoder produced {} payload bytes, max {}",
            n,
            MAX_PAYLOAD_SIZE
        );

        let type_tag = encoder.type_tag();
        assert!(
            type_tag <= TYPE_MASK,
            "encoder declared type {}, max {}",
            type_tag,
            TYPE_MASK
        );

        buf[0] = VERSION;
        buf[TYPE_ENC_INDEX] = (encoder.encoding().bits() << 6) | type_tag;
        buf[LENGTH_OFFSET..HEADER_SIZE].copy_from_slice(&(n as u16).to_be_bytes());
        buf.truncate(HEADER_SIZE + n);

        Self { raw: buf.into() }
    }

    /// Write the full raw bytes (header + payload) to a sink.
    ///
    /// Returns the byte count written. Sink failures propagate unchanged; a
    /// zero-length write means the sink is gone.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<usize> {
        let mut offset = 0usize;
        while offset < self.raw.len() {
            match sink.write(&self.raw[offset..]) {
                Ok(0) => return Err(FrameError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(self.raw.len())
    }

    /// Copy the full raw bytes into a caller-supplied buffer.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < self.raw.len() {
            return Err(FrameError::BufferTooSmall {
                needed: self.raw.len(),
                len: buf.len(),
            });
        }
        buf[..self.raw.len()].copy_from_slice(&self.raw);
        Ok(self.raw.len())
    }

    /// The payload, without the header. Zero-copy view.
    pub fn data(&self) -> &[u8] {
        &self.raw[HEADER_SIZE..]
    }

    /// The 6-bit application type tag.
    pub fn type_tag(&self) -> u8 {
        self.raw[TYPE_ENC_INDEX] & TYPE_MASK
    }

    /// The payload serialization scheme.
    pub fn encoding(&self) -> Encoding {
        Encoding::from_bits(self.raw[TYPE_ENC_INDEX] >> 6)
    }

    /// Total wire size (header + payload).
    pub fn total_len(&self) -> usize {
        self.raw.len()
    }

    /// The full raw bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet({}) -> \"{}\"",
            self.raw.len(),
            String::from_utf8_lossy(self.data())
        )
    }
}

pub(crate) fn declared_payload_len(header: &[u8]) -> usize {
    u16::from_be_bytes([header[LENGTH_OFFSET], header[LENGTH_OFFSET + 1]]) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestEncoder {
        type_tag: u8,
        encoding: Encoding,
        payload: Vec<u8>,
    }

    impl PacketEncoder for TestEncoder {
        fn type_tag(&self) -> u8 {
            self.type_tag
        }

        fn encoding(&self) -> Encoding {
            self.encoding
        }

        fn write_payload(&self, buf: &mut [u8]) -> usize {
            buf[..self.payload.len()].copy_from_slice(&self.payload);
            self.payload.len()
        }
    }

    fn encode(type_tag: u8, encoding: Encoding, payload: &[u8]) -> Packet {
        Packet::from_encoder(&TestEncoder {
            type_tag,
            encoding,
            payload: payload.to_vec(),
        })
    }

    #[test]
    fn roundtrip_preserves_type_encoding_payload() {
        let packet = encode(7, Encoding::Json, b"{\"ok\":true}");

        let decoded = Packet::from_bytes(Bytes::copy_from_slice(packet.as_bytes())).unwrap();

        assert_eq!(decoded.type_tag(), 7);
        assert_eq!(decoded.encoding(), Encoding::Json);
        assert_eq!(decoded.data(), b"{\"ok\":true}");
        assert_eq!(decoded.total_len(), HEADER_SIZE + 11);
    }

    #[test]
    fn roundtrip_at_payload_bounds() {
        for len in [1usize, MAX_PAYLOAD_SIZE] {
            let payload = vec![0xA5u8; len];
            let packet = encode(62, Encoding::Custom, &payload);

            let decoded = Packet::from_bytes(Bytes::copy_from_slice(packet.as_bytes())).unwrap();
            assert_eq!(decoded.type_tag(), 62);
            assert_eq!(decoded.encoding(), Encoding::Custom);
            assert_eq!(decoded.data(), payload.as_slice());
        }
    }

    #[test]
    fn header_layout_is_bit_exact() {
        let packet = encode(0x2A, Encoding::Custom, b"xy");
        let raw = packet.as_bytes();

        assert_eq!(raw[0], VERSION);
        assert_eq!(raw[1], (1 << 6) | 0x2A);
        assert_eq!(&raw[2..4], &2u16.to_be_bytes());
        assert_eq!(&raw[4..], b"xy");
    }

    #[test]
    fn from_bytes_rejects_version_mismatch() {
        let raw = Bytes::from_static(&[9, 0, 0, 1, b'x']);
        let err = Packet::from_bytes(raw).unwrap_err();
        assert!(matches!(
            err,
            FrameError::VersionMismatch {
                expected: VERSION,
                found: 9
            }
        ));
    }

    #[test]
    fn from_bytes_rejects_empty_payload() {
        let raw = Bytes::from_static(&[VERSION, 0, 0, 0]);
        let err = Packet::from_bytes(raw).unwrap_err();
        assert!(matches!(err, FrameError::EmptyPayload));
    }

    #[test]
    fn from_bytes_rejects_length_mismatch() {
        // Header declares 5 payload bytes, buffer holds 2.
        let raw = Bytes::from_static(&[VERSION, 0, 0, 5, b'h', b'i']);
        let err = Packet::from_bytes(raw).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                declared: 5,
                actual: 2
            }
        ));
    }

    #[test]
    #[should_panic(expected = "payload bytes")]
    fn from_encoder_panics_on_oversize_payload() {
        struct Oversize;
        impl PacketEncoder for Oversize {
            fn type_tag(&self) -> u8 {
                1
            }
            fn encoding(&self) -> Encoding {
                Encoding::Custom
            }
            fn write_payload(&self, buf: &mut [u8]) -> usize {
                buf.len()
            }
        }

        let _ = Packet::from_encoder(&Oversize);
    }

    #[test]
    #[should_panic(expected = "declared type")]
    fn from_encoder_panics_on_out_of_range_type() {
        let _ = encode(64, Encoding::Json, b"x");
    }

    #[test]
    fn write_to_emits_raw_bytes() {
        let packet = encode(3, Encoding::Custom, b"abc");

        let mut sink = Vec::new();
        let written = packet.write_to(&mut sink).unwrap();

        assert_eq!(written, packet.total_len());
        assert_eq!(sink.as_slice(), packet.as_bytes());
    }

    #[test]
    fn write_to_propagates_sink_errors() {
        struct BrokenSink;
        impl Write for BrokenSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let packet = encode(3, Encoding::Custom, b"abc");
        let err = packet.write_to(&mut BrokenSink).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn write_to_reports_closed_sink() {
        struct ZeroSink;
        impl Write for ZeroSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let packet = encode(3, Encoding::Custom, b"abc");
        let err = packet.write_to(&mut ZeroSink).unwrap_err();
        assert!(matches!(err, FrameError::Closed));
    }

    #[test]
    fn read_into_copies_full_packet() {
        let packet = encode(5, Encoding::Json, b"[1,2]");

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let n = packet.read_into(&mut buf).unwrap();

        assert_eq!(&buf[..n], packet.as_bytes());
    }

    #[test]
    fn read_into_rejects_short_buffer() {
        let packet = encode(5, Encoding::Json, b"[1,2]");

        let mut buf = [0u8; 4];
        let err = packet.read_into(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::BufferTooSmall { needed: 9, len: 4 }
        ));
    }

    #[test]
    fn reserved_encodings_decode_opaquely() {
        for (bits, expected) in [(2u8, Encoding::Reserved2), (3u8, Encoding::Reserved3)] {
            let raw = Bytes::from(vec![VERSION, (bits << 6) | 1, 0, 1, b'z']);
            let packet = Packet::from_bytes(raw).unwrap();
            assert_eq!(packet.encoding(), expected);
            assert_eq!(packet.type_tag(), 1);
        }
    }

    #[test]
    fn display_previews_payload() {
        let packet = encode(1, Encoding::Custom, b"hello");
        assert_eq!(packet.to_string(), "Packet(9) -> \"hello\"");
    }
}
