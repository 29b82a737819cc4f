use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::framer::PacketFramer;
use crate::packet::{Packet, MAX_PACKET_SIZE};

/// Advisory, cooperative cancellation signal.
///
/// Raised from any thread; observed by the pump at its poll points (between
/// reads). It never interrupts a read already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Bridges a byte source to a packet consumer.
///
/// Reads chunks from the source, feeds them to an owned [`PacketFramer`],
/// and publishes every decoded [`Packet`] to a bounded queue. A full queue
/// blocks the pump — a slow consumer throttles how fast further input is
/// read. One pump per connection, driven by a single thread.
pub struct PacketPump<R> {
    source: R,
    framer: PacketFramer,
}

impl<R: Read> PacketPump<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            framer: PacketFramer::new(),
        }
    }

    /// Drive the source until cancellation, consumer hang-up, or failure.
    ///
    /// Returns `Ok(())` when the cancel token was observed raised or the
    /// receiving side of `out` was dropped — both are clean shutdowns, not
    /// errors. Source EOF surfaces as [`FrameError::Closed`]; I/O and
    /// protocol failures propagate and terminate the pump. A failure here
    /// is scoped to this pump's connection only.
    pub fn run(mut self, out: &SyncSender<Packet>, cancel: &CancelToken) -> Result<()> {
        let mut chunk = [0u8; MAX_PACKET_SIZE];

        loop {
            if cancel.is_cancelled() {
                debug!("pump cancelled");
                return Ok(());
            }

            let read = match self.source.read(&mut chunk) {
                Ok(0) => {
                    debug!("source closed");
                    return Err(FrameError::Closed);
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(error = %err, "source read failed");
                    return Err(FrameError::Io(err));
                }
            };
            trace!(bytes = read, "pushed chunk");

            self.framer.push(&chunk[..read]);
            loop {
                let packet = match self.framer.pull() {
                    Ok(Some(packet)) => packet,
                    Ok(None) => break,
                    Err(err) => {
                        debug!(error = %err, "framing failed");
                        return Err(err);
                    }
                };

                // Blocks while the queue is full; erroring means the
                // receiver is gone, which is a shutdown signal.
                if out.send(packet).is_err() {
                    debug!("consumer hung up");
                    return Ok(());
                }
            }
        }
    }
}
