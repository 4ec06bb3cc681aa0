//! Host receiver for the KVM audio link.
//!
//! Reads the escaped packet stream from stdin, a capture file or a serial
//! device, and writes stereo 16-bit PCM to stdout or a file. The serial
//! port itself (baud rate, raw mode, read timeout) is configured outside
//! this program, e.g. with `stty`.
//!
//! ```text
//! stty -F /dev/ttyACM0 3000000 raw
//! KVM_AUDIO_INPUT=/dev/ttyACM0 kvm-audio-host | aplay -f S16_LE -c 2 -r 48000
//! KVM_AUDIO_INPUT=capture.bin KVM_AUDIO_OUTPUT=take1.wav kvm-audio-host
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`).
//!
//! Ctrl-C stops the capture cleanly: the output is flushed and a WAV
//! header gets its final sizes. A second Ctrl-C exits at once.

mod config;
mod progress;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use kvm_audio::host::{PcmSink, RawPcmSink, Session, SessionError, SyncError, WavSink};
use log::{debug, info, warn};
use tokio::signal;

use config::{HostConfig, Input, Output};
use progress::{Progress, REPORT_INTERVAL};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = HostConfig::from_env().context("invalid configuration")?;
    debug!("{config:?}");

    let stop = Arc::new(AtomicBool::new(false));
    watch_ctrl_c(Arc::clone(&stop))?;

    let reader = open_input(&config.input)?;
    let mut session = match Session::open_until(reader, config.decoder_options(), stop) {
        Ok(session) => session,
        Err(SessionError::Sync(SyncError::Stopped { consumed })) => {
            info!("stopped before any packet arrived ({consumed} bytes skipped)");
            return Ok(());
        }
        Err(e) => return Err(e).context("no packet stream on input"),
    };
    info!(
        "decoding from byte {} ({})",
        session.sync_offset(),
        if config.follow { "following" } else { "until end of input" }
    );

    let mut sink = Progress::new(open_output(&config)?, REPORT_INTERVAL);

    let stats = session.run(&mut sink).context("capture session failed")?;
    info!(
        "wrote {} frames; {} short reads, {} retries, {} realignments",
        sink.total_frames(),
        stats.short_reads,
        stats.retries,
        stats.realignments
    );
    Ok(())
}

/// Set `stop` on the first Ctrl-C; exit on the second.
fn watch_ctrl_c(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting signal runtime")?;
    thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                loop {
                    if let Err(e) = signal::ctrl_c().await {
                        warn!("cannot listen for Ctrl-C: {e}");
                        return;
                    }
                    if stop.load(Ordering::Relaxed) {
                        warn!("second Ctrl-C, exiting without finishing output");
                        std::process::exit(130);
                    }
                    info!("Ctrl-C, stopping capture");
                    stop.store(true, Ordering::Relaxed);
                }
            })
        })
        .context("spawning Ctrl-C watcher")?;
    Ok(())
}

fn open_input(input: &Input) -> Result<Box<dyn Read>> {
    Ok(match input {
        Input::Stdin => Box::new(BufReader::new(io::stdin().lock())),
        Input::Path(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            info!("reading {}", path.display());
            Box::new(BufReader::new(file))
        }
    })
}

fn open_output(config: &HostConfig) -> Result<Box<dyn PcmSink>> {
    Ok(match &config.output {
        Output::Stdout => Box::new(RawPcmSink::new(BufWriter::new(io::stdout().lock()))),
        Output::Raw(path) => {
            let file = create(path)?;
            info!("writing raw PCM to {}", path.display());
            Box::new(RawPcmSink::new(BufWriter::new(file)))
        }
        Output::Wav(path) => {
            let file = create(path)?;
            info!(
                "writing WAV to {} at {} Hz",
                path.display(),
                config.sample_rate
            );
            let sink = WavSink::with_sample_rate(BufWriter::new(file), config.sample_rate)
                .with_context(|| format!("writing WAV header to {}", path.display()))?;
            Box::new(sink)
        }
    })
}

fn create(path: &std::path::Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}
