//! Stream synchronizer: find the first packet boundary in an unaligned stream.
//!
//! The host opens the link at an arbitrary point, usually in the middle of a
//! packet. Two consecutive `0xFF` bytes only ever occur as a terminator, so
//! the byte after the first such pair is the start of a packet.
//!
//! A lone `0xFF` is ordinary sample data (a low byte). The byte read after it
//! is not skipped: it becomes the next scan candidate.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use thiserror::Error;

use crate::constants::TERMINATOR_BYTE;

use super::{back_off, is_transient, ReadPolicy};

/// Byte-at-a-time boundary scanner.
#[derive(Debug, Default)]
pub struct Synchronizer {
    saw_ff: bool,
    consumed: usize,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next byte. Returns `true` once a boundary has just been consumed.
    pub fn push(&mut self, byte: u8) -> bool {
        self.consumed += 1;
        if byte != TERMINATOR_BYTE {
            self.saw_ff = false;
            return false;
        }
        if self.saw_ff {
            self.saw_ff = false;
            return true;
        }
        self.saw_ff = true;
        false
    }

    /// A read produced no byte; whatever was pending counts as non-matching.
    pub fn interrupt(&mut self) {
        self.saw_ff = false;
    }

    /// Bytes fed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// Failure to acquire synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("stream ended after {consumed} bytes without a packet boundary")]
    EndOfStream { consumed: usize },

    #[error("stopped after {consumed} bytes before a packet boundary was found")]
    Stopped { consumed: usize },

    #[error("read failed while searching for a packet boundary")]
    Io(#[from] io::Error),
}

/// Read from `reader` until just past the first packet boundary.
///
/// Returns the number of bytes consumed, which is the stream offset of the
/// first packet. Transient read errors (and idle reads under
/// [`ReadPolicy::Follow`]) are logged, break any half-seen boundary, and
/// scanning continues with the next read.
pub fn acquire<R: Read + ?Sized>(reader: &mut R, policy: ReadPolicy) -> Result<usize, SyncError> {
    acquire_until(reader, policy, &AtomicBool::new(false))
}

/// [`acquire`] that gives up with [`SyncError::Stopped`] once `stop` is set.
///
/// `stop` is only looked at after a read that produced no byte.
pub fn acquire_until<R: Read + ?Sized>(
    reader: &mut R,
    policy: ReadPolicy,
    stop: &AtomicBool,
) -> Result<usize, SyncError> {
    let mut sync = Synchronizer::new();
    let mut byte = [0u8; 1];

    loop {
        let failure = match reader.read(&mut byte) {
            Ok(0) => match policy {
                ReadPolicy::StopAtEof => {
                    return Err(SyncError::EndOfStream {
                        consumed: sync.consumed(),
                    })
                }
                ReadPolicy::Follow => {
                    debug!("link idle while searching for a packet boundary");
                    None
                }
            },
            Ok(_) => {
                if sync.push(byte[0]) {
                    info!("synchronized after {} bytes", sync.consumed());
                    return Ok(sync.consumed());
                }
                continue;
            }
            Err(e) if is_transient(&e) => {
                warn!("read error while searching for a packet boundary: {e}");
                Some(e)
            }
            Err(e) => return Err(e.into()),
        };

        sync.interrupt();
        if stop.load(Ordering::Relaxed) {
            return Err(SyncError::Stopped {
                consumed: sync.consumed(),
            });
        }
        back_off(failure.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::{Event, ScriptedReader};
    use crate::wire::find_boundary;
    use std::io::Cursor;

    fn acquire_bytes(bytes: &[u8]) -> Result<usize, SyncError> {
        acquire(&mut Cursor::new(bytes), ReadPolicy::StopAtEof)
    }

    #[test]
    fn stops_right_after_the_pair() {
        assert_eq!(acquire_bytes(&[0xFF, 0xFF, 1, 2]).unwrap(), 2);
        assert_eq!(acquire_bytes(&[9, 8, 7, 0xFF, 0xFF]).unwrap(), 5);
    }

    #[test]
    fn leaves_the_reader_at_the_packet_start() {
        let mut cursor = Cursor::new(vec![0x12, 0xFF, 0xFF, 0xAB, 0x0C]);
        acquire(&mut cursor, ReadPolicy::StopAtEof).unwrap();
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, [0xAB, 0x0C]);
    }

    #[test]
    fn isolated_ff_does_not_synchronize() {
        assert!(matches!(
            acquire_bytes(&[0xFF, 0x00, 0xFF, 0x10]),
            Err(SyncError::EndOfStream { consumed: 4 })
        ));
        // The byte after a lone 0xFF is a fresh candidate.
        assert_eq!(acquire_bytes(&[0x01, 0xFF, 0x02, 0xFF, 0xFF]).unwrap(), 5);
    }

    #[test]
    fn agrees_with_slice_search() {
        let streams: [&[u8]; 5] = [
            &[0xFF, 0xFF],
            &[0xFF, 0xFF, 0xFF],
            &[0, 0xFF, 0, 0xFF, 0xFF, 0xFF],
            &[0x34, 0x0F, 0xFF, 0x0F, 0xFF, 0xFF, 0x00],
            &[0xFE, 0xFF, 0xFF],
        ];
        for s in streams {
            assert_eq!(acquire_bytes(s).ok(), find_boundary(s), "{s:02X?}");
        }
    }

    #[test]
    fn empty_stream_reports_end() {
        assert!(matches!(
            acquire_bytes(&[]),
            Err(SyncError::EndOfStream { consumed: 0 })
        ));
    }

    #[test]
    fn transient_error_breaks_a_half_seen_boundary() {
        let mut reader = ScriptedReader::new(vec![
            Event::Bytes(vec![0x05, 0xFF]),
            Event::Error(io::ErrorKind::TimedOut),
            Event::Bytes(vec![0xFF, 0x01, 0xFF, 0xFF]),
        ]);
        // The 0xFF before the timeout does not pair with the one after it.
        assert_eq!(acquire(&mut reader, ReadPolicy::StopAtEof).unwrap(), 6);
    }

    #[test]
    fn follow_policy_waits_through_idle_reads() {
        let mut reader = ScriptedReader::new(vec![
            Event::Bytes(vec![0x01]),
            Event::Idle,
            Event::Idle,
            Event::Bytes(vec![0xFF, 0xFF]),
        ]);
        assert_eq!(acquire(&mut reader, ReadPolicy::Follow).unwrap(), 3);
    }

    #[test]
    fn stop_flag_ends_an_idle_search() {
        let mut reader = ScriptedReader::new(vec![Event::Bytes(vec![0x01, 0xFF]), Event::Idle]);
        let stop = AtomicBool::new(true);
        assert!(matches!(
            acquire_until(&mut reader, ReadPolicy::Follow, &stop),
            Err(SyncError::Stopped { consumed: 2 })
        ));
    }

    #[test]
    fn stop_flag_does_not_cut_a_flowing_stream_short() {
        let mut reader = ScriptedReader::new(vec![Event::Bytes(vec![0x01, 0xFF, 0xFF])]);
        let stop = AtomicBool::new(true);
        assert_eq!(
            acquire_until(&mut reader, ReadPolicy::Follow, &stop).unwrap(),
            3
        );
    }

    #[test]
    fn hard_errors_are_fatal() {
        let mut reader = ScriptedReader::new(vec![Event::Error(io::ErrorKind::PermissionDenied)]);
        assert!(matches!(
            acquire(&mut reader, ReadPolicy::Follow),
            Err(SyncError::Io(_))
        ));
    }

    #[test]
    fn synchronizer_state_machine() {
        let mut s = Synchronizer::new();
        assert!(!s.push(0xFF));
        s.interrupt();
        assert!(!s.push(0xFF));
        assert!(s.push(0xFF));
        assert_eq!(s.consumed(), 3);
    }
}
