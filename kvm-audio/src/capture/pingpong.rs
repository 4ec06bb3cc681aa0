//! Ping-pong capture buffers shared between the DMA interrupt and the main loop.
//!
//! ```text
//!              ┌─────────────── chain ───────────────┐
//!              ▼                                     │
//! ADC FIFO ──► Buffer A (256×u16) ──done──► chain ──► Buffer B (256×u16) ──done──┘
//!                 │                                      │
//!            ready[A] = true                        ready[B] = true
//!                 ▼                                      ▼
//!            main loop drains A                     main loop drains B
//! ```
//!
//! ## Synchronization
//!
//! All shared state is atomic and each field has exactly one writer per
//! transition: the interrupt sets a ready flag, the main loop clears it. Every
//! write is a single store; the Cortex-M0+ has no read-modify-write atomics,
//! so counters are bumped with a load followed by a store from their only
//! writer (the interrupt). Nothing here takes a lock, so the interrupt can
//! never stall behind the main loop.
//!
//! ## Overflow
//!
//! If the main loop has not drained a buffer by the time the DMA fills it
//! again, the old contents are silently overwritten. The interrupt counts
//! this as an overrun for diagnostics; it is not an error.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::constants::{BUFFER_BYTES, BUFFER_SAMPLES};

/// One DMA target buffer.
///
/// Aligned to its own size so the DMA write ring wraps exactly at the end.
#[repr(C, align(512))]
pub struct CaptureBuffer {
    samples: [u16; BUFFER_SAMPLES],
}

const _: () = {
    assert!(BUFFER_BYTES.is_power_of_two());
    assert!(core::mem::size_of::<CaptureBuffer>() == BUFFER_BYTES);
    assert!(core::mem::align_of::<CaptureBuffer>() == BUFFER_BYTES);
};

impl CaptureBuffer {
    const fn zeroed() -> Self {
        CaptureBuffer {
            samples: [0; BUFFER_SAMPLES],
        }
    }
}

/// Which of the two capture buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    /// Both buffers in drain priority order.
    pub const ALL: [BufferId; 2] = [BufferId::A, BufferId::B];

    pub const fn index(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }

    /// The buffer this one chains to.
    pub const fn other(self) -> BufferId {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }
}

/// Snapshot of the capture counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureStats {
    /// Completed transfers per buffer (wrapping).
    pub completions: [u32; 2],
    /// Buffers refilled before the main loop drained them.
    pub overruns: u32,
}

impl CaptureStats {
    /// Completed transfers across both buffers.
    pub fn total_completions(&self) -> u32 {
        self.completions[0].wrapping_add(self.completions[1])
    }
}

/// The two capture buffers plus their ready flags and counters.
///
/// Meant to live in a `static`; every method takes `&self`.
pub struct PingPong {
    buffers: [UnsafeCell<CaptureBuffer>; 2],
    ready: [AtomicBool; 2],
    completions: [AtomicU32; 2],
    overruns: AtomicU32,
}

// SAFETY: Buffer memory is only touched through volatile accesses of whole
// `u16` words (the DMA engine on target), and all flags/counters are atomics.
// Torn *buffer contents* are an accepted outcome, torn flags are impossible.
unsafe impl Sync for PingPong {}

impl PingPong {
    /// Both buffers zeroed, no flags set.
    pub const fn new() -> Self {
        PingPong {
            buffers: [
                UnsafeCell::new(CaptureBuffer::zeroed()),
                UnsafeCell::new(CaptureBuffer::zeroed()),
            ],
            ready: [AtomicBool::new(false), AtomicBool::new(false)],
            completions: [AtomicU32::new(0), AtomicU32::new(0)],
            overruns: AtomicU32::new(0),
        }
    }

    /// Start address of a buffer, for programming the DMA write address.
    pub fn dma_target(&self, id: BufferId) -> *mut u16 {
        self.buffers[id.index()].get().cast::<u16>()
    }

    /// Interrupt side: a transfer into `id` has finished.
    ///
    /// Bumps the completion counter, records an overrun if the buffer was
    /// still waiting to be drained, then marks it ready. Copies nothing.
    pub fn on_transfer_complete(&self, id: BufferId) {
        let i = id.index();

        let n = self.completions[i].load(Ordering::Relaxed);
        self.completions[i].store(n.wrapping_add(1), Ordering::Relaxed);

        if self.ready[i].load(Ordering::Relaxed) {
            let o = self.overruns.load(Ordering::Relaxed);
            self.overruns.store(o.wrapping_add(1), Ordering::Relaxed);
        }

        self.ready[i].store(true, Ordering::Release);
    }

    /// Main-loop side: the next buffer waiting to be drained, A before B.
    ///
    /// Never waits; `None` means nothing is ready yet.
    pub fn poll(&self) -> Option<BufferId> {
        BufferId::ALL
            .into_iter()
            .find(|id| self.ready[id.index()].load(Ordering::Acquire))
    }

    /// Whether `id` is marked ready.
    pub fn is_ready(&self, id: BufferId) -> bool {
        self.ready[id.index()].load(Ordering::Acquire)
    }

    /// Main-loop side: `id` has been drained.
    pub fn release(&self, id: BufferId) {
        self.ready[id.index()].store(false, Ordering::Release);
    }

    /// Read the samples of `id` in place.
    ///
    /// The DMA engine may already be refilling this buffer; each word is read
    /// with a volatile load, so the result can mix old and new samples but
    /// never a torn word.
    pub fn samples(&self, id: BufferId) -> impl Iterator<Item = u16> + '_ {
        let base = self.dma_target(id).cast_const();
        (0..BUFFER_SAMPLES).map(move |i| {
            // SAFETY: `i < BUFFER_SAMPLES`, the buffer is live for `'_`, and
            // `u16` has no invalid bit patterns.
            unsafe { core::ptr::read_volatile(base.add(i)) }
        })
    }

    /// Write samples into `id` the way the DMA engine would.
    ///
    /// Software stand-in for the converter; used by tests and simulations.
    /// Extra input beyond [`BUFFER_SAMPLES`] is ignored.
    pub fn fill_from(&self, id: BufferId, samples: &[u16]) {
        let base = self.dma_target(id);
        for (i, &s) in samples.iter().take(BUFFER_SAMPLES).enumerate() {
            // SAFETY: `i < BUFFER_SAMPLES` and the buffer is live.
            unsafe { core::ptr::write_volatile(base.add(i), s) }
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            completions: [
                self.completions[0].load(Ordering::Relaxed),
                self.completions[1].load(Ordering::Relaxed),
            ],
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

impl Default for PingPong {
    fn default() -> Self {
        Self::new()
    }
}
