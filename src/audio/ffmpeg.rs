//! Fast decode path through an ffmpeg subprocess
//!
//! ffmpeg seeks, downmixes and resamples in one pass and streams raw
//! little-endian f32 PCM on stdout.

use super::{DecodeTier, LoadRequest};
use crate::error::{Result, StemmixError};
use crate::types::AudioBuffer;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FfmpegTier {
    command: String,
}

impl FfmpegTier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl DecodeTier for FfmpegTier {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn decode(&self, request: &LoadRequest) -> Result<AudioBuffer> {
        let path = request
            .path
            .to_str()
            .ok_or_else(|| StemmixError::upstream("ffmpeg", "path is not valid UTF-8"))?;

        let mut cmd = Command::new(&self.command);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        if request.offset_secs > 0.0 {
            cmd.args(["-ss", &format!("{:.3}", request.offset_secs)]);
        }
        if let Some(duration) = request.duration_secs {
            cmd.args(["-t", &format!("{:.3}", duration)]);
        }
        cmd.args(["-i", path, "-ac", "1", "-ar"])
            .arg(request.sample_rate.to_string())
            .args(["-f", "f32le", "-acodec", "pcm_f32le", "-"])
            .stdin(Stdio::null());

        let output = cmd
            .output()
            .map_err(|e| StemmixError::upstream("ffmpeg", format!("failed to spawn: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StemmixError::upstream(
                "ffmpeg",
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let samples = parse_f32le(&output.stdout);
        if samples.is_empty() {
            return Err(StemmixError::upstream("ffmpeg", "produced no audio"));
        }

        debug!("ffmpeg decoded {} samples", samples.len());
        Ok(AudioBuffer::new(samples, request.sample_rate))
    }
}

/// Interpret raw bytes as little-endian f32 samples (a trailing partial sample is dropped)
pub fn parse_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
