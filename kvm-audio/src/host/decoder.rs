//! Frame decoder: two-byte words in, stereo PCM frames out.
//!
//! Runs after [`acquire`](super::acquire) has positioned the reader at the
//! start of a packet. Each word is either a terminator (skipped, the
//! left/right phase is untouched) or a raw sample that is bias-corrected,
//! scaled to 16 bits and fed to the [`StereoPairer`].
//!
//! The phase is set to "expect left" once, when the decoder is built. It is
//! never re-derived from the stream unless
//! [`realign_on_boundary`](DecoderOptions::realign_on_boundary) is enabled.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::constants::BUFFER_SAMPLES;
use crate::pcm::{sample_to_pcm, AudioFrame, StereoPairer};
use crate::wire::{decode_word, Word};

use super::{back_off, is_transient, ReadPolicy};

/// Decoder behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Meaning of a zero-byte read.
    pub policy: ReadPolicy,
    /// Drop a dangling left sample at a packet boundary so every packet
    /// starts on the left channel. Off by default: the phase then carries
    /// across boundaries unchanged.
    pub realign_on_boundary: bool,
    /// Samples a packet is expected to carry; deviations are counted and
    /// logged. `None` disables the check.
    pub packet_samples: Option<usize>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            policy: ReadPolicy::StopAtEof,
            realign_on_boundary: false,
            packet_samples: Some(BUFFER_SAMPLES),
        }
    }
}

/// Running counters of a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    /// Sample words decoded.
    pub samples: u64,
    /// Terminators skipped.
    pub boundaries: u64,
    /// Frames emitted.
    pub frames: u64,
    /// Reads that returned fewer bytes than requested.
    pub short_reads: u64,
    /// Transient errors and idle reads that were retried.
    pub retries: u64,
    /// Packets whose length differed from `packet_samples`.
    pub odd_packets: u64,
    /// Dangling left samples dropped by `realign_on_boundary`.
    pub realignments: u64,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("read failed while decoding frames")]
    Io(#[from] io::Error),
}

/// Decodes stereo frames from a synchronized byte stream.
pub struct FrameDecoder<R> {
    reader: R,
    options: DecoderOptions,
    pairer: StereoPairer,
    stats: DecoderStats,
    packet_len: usize,
    stop: Option<Arc<AtomicBool>>,
}

impl<R: Read> FrameDecoder<R> {
    /// `reader` must be positioned right after a packet boundary.
    pub fn new(reader: R, options: DecoderOptions) -> Self {
        FrameDecoder {
            reader,
            options,
            pairer: StereoPairer::new(),
            stats: DecoderStats::default(),
            packet_len: 0,
            stop: None,
        }
    }

    /// End the stream (`Ok(None)`) at the next empty or failed read after
    /// `flag` is set. A half-read word is dropped.
    pub fn stop_when(&mut self, flag: Arc<AtomicBool>) {
        self.stop = Some(flag);
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Next complete frame, or `None` once the stream has ended.
    pub fn next_frame(&mut self) -> Result<Option<AudioFrame>, DecodeError> {
        loop {
            let Some(word) = self.next_word()? else {
                return Ok(None);
            };

            match word {
                Word::Boundary => self.on_boundary(),
                Word::Sample(raw) => {
                    self.stats.samples += 1;
                    self.packet_len += 1;
                    if let Some(frame) = self.pairer.push(sample_to_pcm(raw)) {
                        self.stats.frames += 1;
                        return Ok(Some(frame));
                    }
                }
            }
        }
    }

    /// Read one word, retrying until both bytes are in.
    ///
    /// A short read keeps what arrived and asks for the rest, so the stream
    /// stays word-aligned and the phase does not move. `None` only under
    /// [`ReadPolicy::StopAtEof`] at end of stream, or once a stop flag is
    /// set; a trailing odd byte is dropped.
    fn next_word(&mut self) -> Result<Option<Word>, DecodeError> {
        let mut buf = [0u8; 2];
        let mut filled = 0;

        while filled < buf.len() {
            let failure = match self.reader.read(&mut buf[filled..]) {
                Ok(0) => match self.options.policy {
                    ReadPolicy::StopAtEof => {
                        if filled > 0 {
                            debug!("dropping trailing odd byte at end of stream");
                        }
                        return Ok(None);
                    }
                    ReadPolicy::Follow => None,
                },
                Ok(n) => {
                    filled += n;
                    if filled < buf.len() {
                        self.stats.short_reads += 1;
                        warn!("short read ({filled} of 2 bytes), retrying");
                    }
                    continue;
                }
                Err(e) if is_transient(&e) => {
                    warn!("read error while decoding, retrying: {e}");
                    Some(e)
                }
                Err(e) => return Err(e.into()),
            };

            if self.stop_requested() {
                debug!("stop requested, ending the stream");
                return Ok(None);
            }
            self.stats.retries += 1;
            back_off(failure.as_ref());
        }

        Ok(Some(decode_word(buf)))
    }

    fn on_boundary(&mut self) {
        self.stats.boundaries += 1;

        if let Some(expected) = self.options.packet_samples {
            if self.packet_len != expected {
                self.stats.odd_packets += 1;
                warn!(
                    "packet carried {} samples, expected {expected}",
                    self.packet_len
                );
            }
        }
        self.packet_len = 0;

        if self.options.realign_on_boundary && self.pairer.reset() {
            self.stats.realignments += 1;
            warn!("channel phase out of step at packet boundary, realigned to left");
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for FrameDecoder<R> {
    type Item = Result<AudioFrame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
