//! One capture session: synchronize once, then decode until the stream ends.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use super::decoder::{DecodeError, DecoderOptions, DecoderStats, FrameDecoder};
use super::sink::PcmSink;
use super::sync::{acquire_until, SyncError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not synchronize to the packet stream")]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("writing PCM output failed")]
    Sink(#[source] io::Error),
}

/// A synchronized stream, ready to decode.
pub struct Session<R> {
    decoder: FrameDecoder<R>,
    sync_offset: usize,
    stop: Arc<AtomicBool>,
}

impl<R: Read> Session<R> {
    /// Scan `reader` for the first packet boundary and set up the decoder
    /// right behind it.
    pub fn open(reader: R, options: DecoderOptions) -> Result<Self, SessionError> {
        Self::open_until(reader, options, Arc::new(AtomicBool::new(false)))
    }

    /// [`open()`](Self::open) with a stop flag, e.g. set from a Ctrl-C
    /// handler. Setting it ends synchronization with
    /// [`SyncError::Stopped`] and ends [`run()`](Self::run) cleanly.
    pub fn open_until(
        mut reader: R,
        options: DecoderOptions,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, SessionError> {
        let sync_offset = acquire_until(&mut reader, options.policy, &stop)?;
        let mut decoder = FrameDecoder::new(reader, options);
        decoder.stop_when(Arc::clone(&stop));
        Ok(Session {
            decoder,
            sync_offset,
            stop,
        })
    }

    /// Bytes discarded before the first packet.
    pub fn sync_offset(&self) -> usize {
        self.sync_offset
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn decoder(&mut self) -> &mut FrameDecoder<R> {
        &mut self.decoder
    }

    /// Decode every frame into `sink`, then finish it.
    ///
    /// Returns when the stream ends or the stop flag is set. Under
    /// [`ReadPolicy::Follow`](super::ReadPolicy::Follow) the stream only
    /// ends on a hard read error; the sink is still finished then, so a WAV
    /// header holds the sizes of what was written, and the read error is
    /// returned. A failing sink is not finished.
    pub fn run<S: PcmSink + ?Sized>(&mut self, sink: &mut S) -> Result<DecoderStats, SessionError> {
        while !self.stop.load(Ordering::Relaxed) {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => sink.write_frame(frame).map_err(SessionError::Sink)?,
                Ok(None) => break,
                Err(e) => {
                    if let Err(finish) = sink.finish() {
                        warn!("could not finish output after read error: {finish}");
                    }
                    return Err(e.into());
                }
            }
        }
        if self.stop.load(Ordering::Relaxed) {
            info!("stop requested");
        }
        sink.finish().map_err(SessionError::Sink)?;

        let stats = self.decoder.stats();
        info!(
            "stream ended: {} frames, {} packets, {} odd packets",
            stats.frames, stats.boundaries, stats.odd_packets
        );
        debug!("{stats:?}");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::{Event, ScriptedReader};
    use crate::host::{ReadPolicy, WavSink};
    use crate::pcm::{sample_to_pcm, AudioFrame};
    use std::io::{Cursor, Write};

    struct FullDisk;

    impl PcmSink for FullDisk {
        fn write_frame(&mut self, _frame: AudioFrame) -> io::Result<()> {
            Err(io::Error::other("no space left"))
        }
    }

    fn options() -> DecoderOptions {
        DecoderOptions {
            packet_samples: Some(2),
            ..DecoderOptions::default()
        }
    }

    #[test]
    fn starts_after_the_first_boundary() {
        // Tail of a previous packet, then one full packet.
        let bytes = vec![0x34, 0x12, 0xFF, 0xFF, 0x00, 0x08, 0xFF, 0x0F, 0xFF, 0xFF];
        let mut session = Session::open(Cursor::new(bytes), options()).unwrap();
        assert_eq!(session.sync_offset(), 4);

        let mut frames = Vec::new();
        let stats = session.run(&mut frames).unwrap();
        assert_eq!(frames, vec![AudioFrame::new(0, sample_to_pcm(0x0FFF))]);
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.boundaries, 1);
    }

    #[test]
    fn no_boundary_is_a_sync_error() {
        let err = Session::open(Cursor::new(vec![1, 2, 3]), options())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SessionError::Sync(SyncError::EndOfStream { consumed: 3 })
        ));
    }

    #[test]
    fn sink_failure_ends_the_run() {
        let bytes = vec![0xFF, 0xFF, 1, 0, 2, 0, 0xFF, 0xFF];
        let mut session = Session::open(Cursor::new(bytes), options()).unwrap();
        assert!(matches!(
            session.run(&mut FullDisk),
            Err(SessionError::Sink(_))
        ));
    }

    #[test]
    fn read_error_still_finishes_the_wav() {
        let reader = ScriptedReader::new(vec![
            Event::Bytes(vec![0xFF, 0xFF, 0x00, 0x08, 0x01, 0x08, 0xFF, 0xFF]),
            Event::Idle,
            Event::Error(io::ErrorKind::BrokenPipe),
        ]);
        let follow = DecoderOptions {
            policy: ReadPolicy::Follow,
            ..options()
        };
        let mut session = Session::open(reader, follow).unwrap();
        let mut wav = WavSink::new(Cursor::new(Vec::new())).unwrap();

        assert!(matches!(
            session.run(&mut wav),
            Err(SessionError::Decode(DecodeError::Io(_)))
        ));
        let bytes = wav.into_inner().into_inner();
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[4..8], &40u32.to_le_bytes());
        assert_eq!(&bytes[40..44], &4u32.to_le_bytes());
    }

    /// Collects frames and raises the stop flag after the first one.
    struct StopAfterFirst {
        frames: Vec<AudioFrame>,
        stop: Arc<AtomicBool>,
        finished: bool,
    }

    impl PcmSink for StopAfterFirst {
        fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()> {
            self.frames.push(frame);
            self.stop.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn finish(&mut self) -> io::Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn stop_flag_ends_the_run_cleanly() {
        let bytes = vec![0xFF, 0xFF, 1, 0, 2, 0, 0xFF, 0xFF, 3, 0, 4, 0, 0xFF, 0xFF];
        let stop = Arc::new(AtomicBool::new(false));
        let mut session =
            Session::open_until(Cursor::new(bytes), options(), Arc::clone(&stop)).unwrap();
        let mut sink = StopAfterFirst {
            frames: Vec::new(),
            stop,
            finished: false,
        };

        let stats = session.run(&mut sink).unwrap();
        assert_eq!(sink.frames, vec![AudioFrame::new(sample_to_pcm(1), sample_to_pcm(2))]);
        assert!(sink.finished);
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn stop_before_sync_is_reported() {
        let reader = ScriptedReader::new(vec![Event::Bytes(vec![1, 2]), Event::Idle]);
        let follow = DecoderOptions {
            policy: ReadPolicy::Follow,
            ..options()
        };
        let err = Session::open_until(reader, follow, Arc::new(AtomicBool::new(true)))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SessionError::Sync(SyncError::Stopped { consumed: 2 })
        ));
    }

    #[test]
    fn raw_output_matches_frames() {
        let bytes = vec![0xFF, 0xFF, 0x00, 0x08, 0x01, 0x08, 0xFF, 0xFF];
        let mut session = Session::open(Cursor::new(bytes), options()).unwrap();
        let mut sink = crate::host::RawPcmSink::new(Vec::new());
        session.run(&mut sink).unwrap();

        let mut expected = Vec::new();
        expected.write_all(&AudioFrame::new(0, 16).to_le_bytes()).unwrap();
        assert_eq!(sink.into_inner(), expected);
    }
}
