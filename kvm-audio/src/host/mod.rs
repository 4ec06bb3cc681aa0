//! Host side: recover packets from the serial byte stream and emit PCM.
//!
//! ## Pipeline
//!
//! ```text
//! Read (tty / file / stdin)
//!   └─► acquire()        scan for the first 0xFF 0xFF, once
//!         └─► FrameDecoder   2-byte words, skip boundaries, L/R pairing
//!               └─► PcmSink      raw interleaved i16 LE, or WAV
//! ```
//!
//! [`Session`] ties the three together.
//!
//! ## Read errors
//!
//! Reads that time out, would block or are interrupted are transient: they
//! are logged and retried, never fatal. End of stream depends on
//! [`ReadPolicy`]: a file or pipe really ends, a serial device in raw mode
//! returns zero bytes whenever the line is idle. Idle and would-block reads
//! wait [`IDLE_BACKOFF`] before the next attempt, so a non-blocking tty
//! does not spin a core.
//!
//! ## Stopping
//!
//! A shared `AtomicBool` (see [`Session::open_until`]) ends a followed
//! stream cleanly. It is checked between frames and whenever a read comes
//! back empty, so the sink still gets finished.

use std::io;
use std::thread;
use std::time::Duration;

pub mod sync;
pub mod decoder;
pub mod sink;
pub mod session;

pub use decoder::{DecodeError, DecoderOptions, DecoderStats, FrameDecoder};
pub use session::{Session, SessionError};
pub use sink::{PcmSink, RawPcmSink, WavSink};
pub use sync::{acquire, acquire_until, SyncError, Synchronizer};

/// What a zero-byte read means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// The stream is finished (files, pipes).
    #[default]
    StopAtEof,
    /// The line is idle; keep reading (serial devices with a read timeout).
    Follow,
}

/// Read errors that are retried instead of ending the session.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Pause before retrying a read that returned nothing.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(2);

/// Sleep before retrying a failed read, when retrying at once would spin.
pub(crate) fn back_off(err: Option<&io::Error>) {
    let spins = match err {
        None => true,
        Some(e) => e.kind() == io::ErrorKind::WouldBlock,
    };
    if spins {
        thread::sleep(IDLE_BACKOFF);
    }
}
