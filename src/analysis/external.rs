//! External beat tracker run as a subprocess
//!
//! Speaks the madmom `DBNBeatTracker single <file>` convention: the buffer
//! is written to a scratch WAV and beat times are read from stdout, one per
//! line.

use super::traits::BeatTracker;
use crate::audio::write_wav;
use crate::error::{Result, StemmixError};
use crate::types::AudioBuffer;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExternalBeatTracker {
    command: String,
    available: bool,
}

impl ExternalBeatTracker {
    /// Probe `command` once; an unusable tracker reports unavailable
    pub fn probe(command: impl Into<String>) -> Self {
        let command = command.into();
        let available = Command::new(&command)
            .arg("-h")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        debug!("Beat tracker '{}' available: {}", command, available);
        Self { command, available }
    }
}

impl BeatTracker for ExternalBeatTracker {
    fn track(&self, buffer: &AudioBuffer) -> Result<Vec<f64>> {
        if !self.available {
            return Err(StemmixError::upstream(&self.command, "not installed"));
        }

        let scratch = tempfile::Builder::new().prefix("stemmix-beats").tempdir()?;
        let wav_path = scratch.path().join("input.wav");
        write_wav(buffer, &wav_path)?;

        let output = Command::new(&self.command)
            .arg("single")
            .arg(&wav_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StemmixError::upstream(&self.command, format!("failed to spawn: {}", e)))?;

        if !output.status.success() {
            return Err(StemmixError::upstream(
                &self.command,
                format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let beats = parse_beat_times(&String::from_utf8_lossy(&output.stdout));
        debug!("{} reported {} beats", self.command, beats.len());
        Ok(beats)
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "external-beat-tracker"
    }
}

/// First numeric column of each line, ascending; other lines are skipped
pub fn parse_beat_times(text: &str) -> Vec<f64> {
    let mut beats: Vec<f64> = text
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|field| field.parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();
    beats.sort_by(f64::total_cmp);
    beats
}
