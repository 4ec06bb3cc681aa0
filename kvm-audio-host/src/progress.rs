//! Periodic throughput report around any [`PcmSink`].

use std::io;
use std::time::{Duration, Instant};

use kvm_audio::host::PcmSink;
use kvm_audio::AudioFrame;
use log::info;

pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Passes frames through and logs the measured frame rate every `interval`.
pub struct Progress<S> {
    inner: S,
    interval: Duration,
    window_start: Instant,
    window_frames: u64,
    total_frames: u64,
}

impl<S: PcmSink> Progress<S> {
    pub fn new(inner: S, interval: Duration) -> Self {
        Progress {
            inner,
            interval,
            window_start: Instant::now(),
            window_frames: 0,
            total_frames: 0,
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn report(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        if elapsed > 0.0 {
            info!(
                "{:.0} frames/s ({} frames total)",
                self.window_frames as f64 / elapsed,
                self.total_frames
            );
        }
        self.window_start = now;
        self.window_frames = 0;
    }
}

impl<S: PcmSink> PcmSink for Progress<S> {
    fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()> {
        self.inner.write_frame(frame)?;
        self.window_frames += 1;
        self.total_frames += 1;

        // Checking the clock once per packet's worth of frames is plenty.
        if self.window_frames % 128 == 0 {
            let now = Instant::now();
            if now.duration_since(self.window_start) >= self.interval {
                self.report(now);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_pass_through() {
        let mut progress = Progress::new(Vec::<AudioFrame>::new(), Duration::ZERO);
        for i in 0..300 {
            progress.write_frame(AudioFrame::new(i, -i)).unwrap();
        }
        progress.finish().unwrap();
        assert_eq!(progress.total_frames(), 300);
        assert_eq!(progress.inner.len(), 300);
        assert_eq!(progress.inner[299], AudioFrame::new(299, -299));
    }
}
