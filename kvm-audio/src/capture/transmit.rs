//! Packet transmitter and the main-loop drain step.
//!
//! [`Transmitter`] turns one buffer of raw samples into the escaped wire
//! encoding and pushes it through any [`embedded_io::Write`] (the RP2040
//! UART on target), blocking until every byte has been accepted.
//!
//! [`CaptureLoop`] is one iteration of the firmware main loop: check the
//! ready flags once, send whatever is ready, return. It never waits for the
//! DMA engine.
//!
//! ## Usage
//!
//! ```ignore
//! static BUFFERS: PingPong = PingPong::new();
//!
//! let mut capture = CaptureLoop::new(&BUFFERS, Transmitter::new(uart));
//! loop {
//!     capture.step()?;
//! }
//! ```

use embedded_io::Write;

use crate::constants::TERMINATOR;
use crate::wire::{collides, encode_sample};

use super::pingpong::{BufferId, PingPong};

/// Stack scratch size for encoding, in bytes.
const CHUNK_BYTES: usize = 64;

/// Writes escaped packets to a byte sink.
pub struct Transmitter<W> {
    writer: W,
    packets: u32,
    substitutions: u32,
}

impl<W: Write> Transmitter<W> {
    pub fn new(writer: W) -> Self {
        Transmitter {
            writer,
            packets: 0,
            substitutions: 0,
        }
    }

    /// Encode and send one packet: every sample, then the terminator.
    ///
    /// Blocks until the writer has taken every byte. Returns the number of
    /// bytes written.
    pub fn send<I>(&mut self, samples: I) -> Result<usize, W::Error>
    where
        I: IntoIterator<Item = u16>,
    {
        let mut chunk = [0u8; CHUNK_BYTES];
        let mut len = 0;
        let mut total = 0;

        for sample in samples {
            if collides(sample) {
                self.substitutions = self.substitutions.wrapping_add(1);
            }
            chunk[len..len + 2].copy_from_slice(&encode_sample(sample));
            len += 2;

            if len == CHUNK_BYTES {
                self.writer.write_all(&chunk)?;
                total += len;
                len = 0;
            }
        }
        if len > 0 {
            self.writer.write_all(&chunk[..len])?;
            total += len;
        }

        self.writer.write_all(&TERMINATOR)?;
        total += TERMINATOR.len();

        self.packets = self.packets.wrapping_add(1);
        Ok(total)
    }

    /// Packets sent so far (wrapping).
    pub fn packets_sent(&self) -> u32 {
        self.packets
    }

    /// Samples replaced by the sentinel so far (wrapping).
    pub fn substitutions(&self) -> u32 {
        self.substitutions
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Outcome of one [`CaptureLoop::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No buffer was ready.
    Idle,
    /// The given buffer was sent and released.
    Sent(BufferId),
}

/// Drains ready capture buffers into a [`Transmitter`].
pub struct CaptureLoop<'a, W> {
    buffers: &'a PingPong,
    tx: Transmitter<W>,
}

impl<'a, W: Write> CaptureLoop<'a, W> {
    pub fn new(buffers: &'a PingPong, tx: Transmitter<W>) -> Self {
        CaptureLoop { buffers, tx }
    }

    /// Check the ready flags once and send the first ready buffer, A before B.
    ///
    /// The flag is cleared as soon as the buffer is selected, before any
    /// byte goes out: a selected buffer is spent, even if the write fails.
    /// The DMA engine may be refilling it while it is being read out, and a
    /// completion raised during the send marks it ready again for the next
    /// step.
    pub fn step(&mut self) -> Result<Step, W::Error> {
        let Some(id) = self.buffers.poll() else {
            return Ok(Step::Idle);
        };
        self.buffers.release(id);

        self.tx.send(self.buffers.samples(id))?;
        Ok(Step::Sent(id))
    }

    pub fn transmitter(&self) -> &Transmitter<W> {
        &self.tx
    }

    pub fn buffers(&self) -> &'a PingPong {
        self.buffers
    }
}
