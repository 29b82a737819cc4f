//! Length-prefixed packet framing for ordered byte streams.
//!
//! This is the core of packlane. Every message on the wire is a packet with:
//! - A 1-byte protocol version
//! - A packed type/encoding byte (2-bit encoding tag, 6-bit type tag)
//! - A 2-byte big-endian payload length
//!
//! The framer turns arbitrarily fragmented stream reads back into whole
//! packets; no partial reads, no buffer management in user code.

pub mod error;
pub mod framer;
pub mod packet;
pub mod pump;

pub use error::{FrameError, Result};
pub use framer::PacketFramer;
pub use packet::{
    Encoding, Packet, PacketEncoder, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE,
    PAYLOAD_CAPACITY, VERSION,
};
pub use pump::{CancelToken, PacketPump};
