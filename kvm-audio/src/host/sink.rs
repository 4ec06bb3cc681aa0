//! PCM output: raw interleaved samples or a WAV file.

use std::io::{self, Seek, SeekFrom, Write};

use crate::constants::{CHANNELS, SAMPLE_RATE_HZ};
use crate::pcm::AudioFrame;

/// Destination for decoded frames.
pub trait PcmSink {
    fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()>;

    /// Flush buffered output and finalize any container metadata.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: PcmSink + ?Sized> PcmSink for Box<S> {
    fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

impl PcmSink for Vec<AudioFrame> {
    fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()> {
        self.push(frame);
        Ok(())
    }
}

/// Headerless `i16` little-endian stereo, left first.
pub struct RawPcmSink<W> {
    writer: W,
    frames: u64,
}

impl<W: Write> RawPcmSink<W> {
    pub fn new(writer: W) -> Self {
        RawPcmSink { writer, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PcmSink for RawPcmSink<W> {
    fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()> {
        self.writer.write_all(&frame.to_le_bytes())?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

const BITS_PER_SAMPLE: u16 = 16;
const FRAME_BYTES: u32 = CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8);
const HEADER_BYTES: u32 = 44;
const RIFF_SIZE_OFFSET: u64 = 4;
const DATA_SIZE_OFFSET: u64 = 40;

/// RIFF/WAVE writer, 16-bit PCM stereo.
///
/// The header is written with zero sizes up front and patched by
/// [`finish()`](PcmSink::finish), so the output must be seekable.
pub struct WavSink<W> {
    writer: W,
    data_bytes: u32,
}

impl<W: Write + Seek> WavSink<W> {
    /// Start a WAV stream at [`SAMPLE_RATE_HZ`].
    pub fn new(writer: W) -> io::Result<Self> {
        Self::with_sample_rate(writer, SAMPLE_RATE_HZ)
    }

    pub fn with_sample_rate(mut writer: W, sample_rate: u32) -> io::Result<Self> {
        writer.write_all(&header(sample_rate, 0))?;
        Ok(WavSink {
            writer,
            data_bytes: 0,
        })
    }

    pub fn frames(&self) -> u64 {
        (self.data_bytes / FRAME_BYTES) as u64
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Seek> PcmSink for WavSink<W> {
    fn write_frame(&mut self, frame: AudioFrame) -> io::Result<()> {
        let total = self
            .data_bytes
            .checked_add(FRAME_BYTES)
            .filter(|&n| n <= u32::MAX - (HEADER_BYTES - 8))
            .ok_or_else(|| io::Error::other("WAV data chunk is full (4 GiB)"))?;
        self.writer.write_all(&frame.to_le_bytes())?;
        self.data_bytes = total;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let riff_size = HEADER_BYTES - 8 + self.data_bytes;
        self.writer.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.writer.write_all(&self.data_bytes.to_le_bytes())?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()
    }
}

fn header(sample_rate: u32, data_bytes: u32) -> [u8; HEADER_BYTES as usize] {
    let channels = CHANNELS as u16;
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;
    let fmt_chunk_size = 16u32;
    let riff_size = HEADER_BYTES - 8 + data_bytes;

    let mut h = [0u8; HEADER_BYTES as usize];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&riff_size.to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");

    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&fmt_chunk_size.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&channels.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_bytes.to_le_bytes());
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn le_u32(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    fn le_u16(b: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([b[at], b[at + 1]])
    }

    #[test]
    fn raw_sink_interleaves_left_first() {
        let mut sink = RawPcmSink::new(Vec::new());
        sink.write_frame(AudioFrame::new(1, -1)).unwrap();
        sink.write_frame(AudioFrame::new(i16::MIN, i16::MAX)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.frames(), 2);
        assert_eq!(
            sink.into_inner(),
            [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F]
        );
    }

    #[test]
    fn wav_header_is_patched_on_finish() {
        let mut sink = WavSink::with_sample_rate(Cursor::new(Vec::new()), 48_000).unwrap();
        for i in 0..3 {
            sink.write_frame(AudioFrame::new(i, -i)).unwrap();
        }
        sink.finish().unwrap();
        assert_eq!(sink.frames(), 3);

        let wav = sink.into_inner().into_inner();
        assert_eq!(wav.len(), 44 + 12);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(le_u32(&wav, 4), 36 + 12);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(le_u16(&wav, 20), 1);
        assert_eq!(le_u16(&wav, 22), 2);
        assert_eq!(le_u32(&wav, 24), 48_000);
        assert_eq!(le_u32(&wav, 28), 48_000 * 4);
        assert_eq!(le_u16(&wav, 32), 4);
        assert_eq!(le_u16(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(le_u32(&wav, 40), 12);
        assert_eq!(&wav[44..48], &[0, 0, 0, 0]);
        assert_eq!(&wav[48..52], &[1, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn empty_wav_is_still_valid() {
        let mut sink = WavSink::new(Cursor::new(Vec::new())).unwrap();
        sink.finish().unwrap();
        let wav = sink.into_inner().into_inner();
        assert_eq!(wav.len(), 44);
        assert_eq!(le_u32(&wav, 4), 36);
        assert_eq!(le_u32(&wav, 24), SAMPLE_RATE_HZ);
        assert_eq!(le_u32(&wav, 40), 0);
    }

    #[test]
    fn vec_sink_collects_frames() {
        let mut frames: Vec<AudioFrame> = Vec::new();
        frames.write_frame(AudioFrame::new(5, 6)).unwrap();
        frames.finish().unwrap();
        assert_eq!(frames, vec![AudioFrame::new(5, 6)]);
    }
}
