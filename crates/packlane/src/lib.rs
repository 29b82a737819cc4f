//! Length-prefixed packet framing over stream sockets.
//!
//! packlane carves discrete, bounded-size packets out of a continuous byte
//! stream and encodes typed payloads into the same wire format.
//!
//! # Crate Structure
//!
//! - [`frame`] — Wire format, packet framer, and stream pump

/// Re-export frame types.
pub mod frame {
    pub use packlane_frame::*;
}
