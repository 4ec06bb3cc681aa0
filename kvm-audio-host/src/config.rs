use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use kvm_audio::constants::{BUFFER_SAMPLES, SAMPLE_RATE_HZ};
use kvm_audio::host::{DecoderOptions, ReadPolicy};

pub const INPUT: &str = "KVM_AUDIO_INPUT";
pub const OUTPUT: &str = "KVM_AUDIO_OUTPUT";
pub const SAMPLE_RATE: &str = "KVM_AUDIO_SAMPLE_RATE";
pub const FOLLOW: &str = "KVM_AUDIO_FOLLOW";
pub const REALIGN: &str = "KVM_AUDIO_REALIGN";
pub const PACKET_SAMPLES: &str = "KVM_AUDIO_PACKET_SAMPLES";

/// Where the link bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    Path(PathBuf),
}

/// Where the PCM goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Raw PCM on stdout.
    Stdout,
    /// Raw PCM into a file.
    Raw(PathBuf),
    /// WAV file; picked by a `.wav` extension.
    Wav(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub input: Input,
    pub output: Output,
    /// Only written into the WAV header; the stream carries no rate.
    pub sample_rate: u32,
    pub follow: bool,
    pub realign: bool,
    pub packet_samples: Option<usize>,
}

impl HostConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup; unset and empty variables take defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let input = match var(INPUT).as_deref() {
            None | Some("-") => Input::Stdin,
            Some(path) => Input::Path(PathBuf::from(path)),
        };

        let output = match var(OUTPUT).as_deref() {
            None | Some("-") => Output::Stdout,
            Some(path) if is_wav(Path::new(path)) => Output::Wav(PathBuf::from(path)),
            Some(path) => Output::Raw(PathBuf::from(path)),
        };

        let sample_rate = match var(SAMPLE_RATE) {
            None => SAMPLE_RATE_HZ,
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("{SAMPLE_RATE}={v:?} is not a sample rate"))?,
        };
        if sample_rate == 0 {
            bail!("{SAMPLE_RATE} must be greater than zero");
        }

        let follow = match var(FOLLOW) {
            Some(v) => parse_bool(FOLLOW, &v)?,
            None => matches!(&input, Input::Path(p) if p.starts_with("/dev")),
        };

        let realign = match var(REALIGN) {
            Some(v) => parse_bool(REALIGN, &v)?,
            None => false,
        };

        let packet_samples = match var(PACKET_SAMPLES) {
            None => Some(BUFFER_SAMPLES),
            Some(v) => match v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{PACKET_SAMPLES}={v:?} is not a sample count"))?
            {
                0 => None,
                n => Some(n),
            },
        };

        Ok(HostConfig {
            input,
            output,
            sample_rate,
            follow,
            realign,
            packet_samples,
        })
    }

    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            policy: if self.follow {
                ReadPolicy::Follow
            } else {
                ReadPolicy::StopAtEof
            },
            realign_on_boundary: self.realign,
            packet_samples: self.packet_samples,
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{name}={other:?} is not a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<HostConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HostConfig::from_vars(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_pipe_stdin_to_stdout() {
        assert_eq!(
            config(&[]).unwrap(),
            HostConfig {
                input: Input::Stdin,
                output: Output::Stdout,
                sample_rate: 48_000,
                follow: false,
                realign: false,
                packet_samples: Some(256),
            }
        );
    }

    #[test]
    fn device_input_follows_by_default() {
        let cfg = config(&[(INPUT, "/dev/ttyACM0")]).unwrap();
        assert_eq!(cfg.input, Input::Path("/dev/ttyACM0".into()));
        assert!(cfg.follow);
        assert_eq!(cfg.decoder_options().policy, ReadPolicy::Follow);

        let cfg = config(&[(INPUT, "/dev/ttyACM0"), (FOLLOW, "no")]).unwrap();
        assert!(!cfg.follow);

        let cfg = config(&[(INPUT, "capture.bin")]).unwrap();
        assert!(!cfg.follow);
    }

    #[test]
    fn wav_extension_selects_wav_output() {
        assert_eq!(
            config(&[(OUTPUT, "take1.WAV")]).unwrap().output,
            Output::Wav("take1.WAV".into())
        );
        assert_eq!(
            config(&[(OUTPUT, "take1.pcm")]).unwrap().output,
            Output::Raw("take1.pcm".into())
        );
        assert_eq!(config(&[(OUTPUT, "-")]).unwrap().output, Output::Stdout);
    }

    #[test]
    fn packet_check_can_be_disabled() {
        assert_eq!(config(&[(PACKET_SAMPLES, "0")]).unwrap().packet_samples, None);
        assert_eq!(
            config(&[(PACKET_SAMPLES, "128")]).unwrap().packet_samples,
            Some(128)
        );
    }

    #[test]
    fn realign_maps_to_decoder_option() {
        let cfg = config(&[(REALIGN, "true")]).unwrap();
        assert!(cfg.decoder_options().realign_on_boundary);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(config(&[(SAMPLE_RATE, "fast")]).is_err());
        assert!(config(&[(SAMPLE_RATE, "0")]).is_err());
        assert!(config(&[(FOLLOW, "maybe")]).is_err());
        assert!(config(&[(PACKET_SAMPLES, "-1")]).is_err());
    }

    #[test]
    fn empty_values_take_defaults() {
        assert_eq!(config(&[(INPUT, ""), (SAMPLE_RATE, " ")]).unwrap(), config(&[]).unwrap());
    }
}
