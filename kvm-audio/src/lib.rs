//! # kvm-audio
//!
//! Two analog channels sampled on an RP2040, streamed over a one-way UART
//! link and rebuilt on the host as interleaved stereo 16-bit PCM.
//!
//! The crate is `no_std` so the capture side can be linked straight into the
//! firmware; the host pipeline lives behind the `std` feature (on by default).
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Constants | [`constants`] | Buffer geometry, ADC scale, wire markers |
//! | Capture | [`capture`] | ADC register plan, ping-pong DMA buffers, transmitter |
//! | Wire | [`wire`] | Escape-coded packet framing |
//! | PCM | [`pcm`] | Bias removal / bit-depth expansion, stereo pairing |
//! | Host | [`host`] | Stream synchronizer, frame decoder, PCM/WAV sinks (`std`) |
//!
//! ## Data flow
//!
//! ```text
//! ADC (round robin 0,1) ──DMA──► [A | B] ──Transmitter──► UART ──► Synchronizer ──► FrameDecoder ──► PcmSink
//! ```
//!
//! ## Wire format
//!
//! Each packet is [`constants::BUFFER_SAMPLES`] little-endian `u16` words
//! followed by the terminator `0xFF 0xFF`. A sample equal to `0xFFFF` is sent
//! as [`constants::SENTINEL_WORD`] instead.
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `std` | yes | [`host`] synchronizer, decoder and sinks |

#![cfg_attr(not(feature = "std"), no_std)]

pub mod constants;
pub mod error;
pub mod pcm;
pub mod wire;
pub mod capture;

#[cfg(feature = "std")]
pub mod host;

pub use error::{ConfigError, EncodeError};
pub use pcm::AudioFrame;
