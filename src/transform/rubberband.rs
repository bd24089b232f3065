//! Rubber Band command-line backend
//!
//! Buffers go through scratch WAV files: `rubberband -q --time <1/rate>`
//! for stretching and `rubberband -q --pitch <semitones>` for shifting.

use super::TimePitchBackend;
use crate::audio::wav::read_wav_window;
use crate::audio::write_wav;
use crate::error::{Result, StemmixError};
use crate::types::AudioBuffer;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RubberBand {
    command: String,
    available: bool,
}

impl RubberBand {
    /// Probe `command --version` once
    pub fn probe(command: impl Into<String>) -> Self {
        let command = command.into();
        let available = Command::new(&command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        debug!("Rubber Band '{}' available: {}", command, available);
        Self { command, available }
    }

    fn run(&self, buffer: &AudioBuffer, flag: &str, value: f64) -> Result<AudioBuffer> {
        if !self.available {
            return Err(StemmixError::upstream(&self.command, "not installed"));
        }

        let scratch = tempfile::Builder::new().prefix("stemmix-rb").tempdir()?;
        let input = scratch.path().join("in.wav");
        let output = scratch.path().join("out.wav");
        write_wav(buffer, &input)?;

        let result = Command::new(&self.command)
            .arg("-q")
            .arg(flag)
            .arg(format!("{:.6}", value))
            .arg(&input)
            .arg(&output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StemmixError::upstream(&self.command, format!("failed to spawn: {}", e)))?;

        if !result.status.success() {
            return Err(StemmixError::upstream(
                &self.command,
                format!(
                    "exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }

        let processed = read_wav_window(&output, 0.0, None)
            .map_err(|e| StemmixError::upstream(&self.command, format!("unreadable output: {}", e)))?;
        if processed.sample_rate != buffer.sample_rate {
            return Err(StemmixError::upstream(
                &self.command,
                format!("changed sample rate to {}Hz", processed.sample_rate),
            ));
        }
        Ok(processed)
    }
}

impl TimePitchBackend for RubberBand {
    fn stretch(&self, buffer: &AudioBuffer, rate: f64) -> Result<AudioBuffer> {
        self.run(buffer, "--time", 1.0 / rate)
    }

    fn shift(&self, buffer: &AudioBuffer, semitones: f64) -> Result<AudioBuffer> {
        self.run(buffer, "--pitch", semitones)
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "rubberband"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_upstream_error() {
        let rb = RubberBand::probe("stemmix-no-such-rubberband");
        assert!(!rb.is_available());
        let err = rb.stretch(&AudioBuffer::silence(1000, 44100), 1.5).unwrap_err();
        assert!(err.is_upstream());
    }
}
