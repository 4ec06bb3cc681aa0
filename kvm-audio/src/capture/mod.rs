//! Embedded capture side: ADC → ping-pong DMA → UART.
//!
//! Everything in here is `no_std` and allocation-free so it can be linked
//! into the firmware unchanged, and it is hardware-agnostic enough to run
//! under `cargo test` on the host.
//!
//! ## Components
//!
//! | Item | Role |
//! |------|------|
//! | [`SamplerConfig`] | ADC clock divider, round-robin channel mask, raw `CS`/`FCS`/`DIV` values |
//! | [`PingPong`] | The two aligned capture buffers, ready flags and counters |
//! | [`DmaChain`] | Channel pair chained A ⇄ B, raw `CH_CTRL` values, interrupt dispatch |
//! | [`Transmitter`] | Escapes one buffer and writes it plus the terminator |
//! | [`CaptureLoop`] | One non-blocking main-loop iteration |
//!
//! ## Contexts
//!
//! ```text
//! DMA_IRQ_0 (interrupt)                 idle (main loop)
//! ─────────────────────                 ────────────────
//! DmaChain::dispatch(ints, &BUFFERS)    CaptureLoop::step()
//!   └─ PingPong::on_transfer_complete     ├─ PingPong::poll()     (A before B)
//!        counters++, ready[id] = true     ├─ Transmitter::send()  (blocking UART)
//!                                         └─ PingPong::release()
//! ```

pub mod sampler;
pub mod pingpong;
pub mod dma;
pub mod transmit;

pub use dma::DmaChain;
pub use pingpong::{BufferId, CaptureStats, PingPong};
pub use sampler::{ClockDivider, SamplerConfig};
pub use transmit::{CaptureLoop, Step, Transmitter};
