//! The remix and analysis entry points
//!
//! A remix runs strictly in sequence:
//! load → tempo/key → plan → stretch/shift → align → loudness → mix.
//! Every stage takes buffers by reference and returns new ones, so one
//! [`Engine`] can serve independent requests from many threads.

use crate::align::Aligner;
use crate::analysis::stems::PART_NAMES;
use crate::analysis::{KeyEstimator, TempoEstimator};
use crate::audio::{resample, LoadRequest, Loaded};
use crate::backends::Backends;
use crate::config::{EngineConfig, Settings};
use crate::error::{Result, StemmixError};
use crate::mix::{match_loudness, mix};
use crate::transform::plan;
use crate::types::{AudioBuffer, RemixResult, TempoAnalysis};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Confidence reported when only the fallback tempo path produced a value
const FALLBACK_CONFIDENCE: f64 = 0.25;

/// A finished remix: the mixed audio and its report
#[derive(Debug, Clone)]
pub struct Remix {
    pub audio: AudioBuffer,
    pub result: RemixResult,
}

/// Remix/analysis engine bound to a configuration and resolved backends
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    backends: Backends,
    tempo: TempoEstimator,
    key: KeyEstimator,
    aligner: Aligner,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl Engine {
    pub fn new(config: EngineConfig, backends: Backends) -> Self {
        let tempo = TempoEstimator::new(config.tempo.clone()).with_external(backends.beat_tracker.clone());
        Self {
            key: KeyEstimator::new(config.key.clone()),
            aligner: Aligner::new(config.align.clone()),
            tempo,
            backends,
            config,
        }
    }

    /// Engine using only in-process algorithms
    pub fn builtin(config: EngineConfig) -> Self {
        Self::new(config, Backends::builtin())
    }

    /// Probe the configured tools once and build the engine
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.engine.clone(), Backends::resolve(&settings.backends))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    fn load(&self, request: &LoadRequest) -> Loaded {
        self.backends.loader.load(request)
    }

    fn load_whole(&self, path: &Path) -> AudioBuffer {
        self.load(&LoadRequest::whole(path, self.config.sample_rate)).buffer
    }

    // =========================================================================
    // Tempo-only analysis
    // =========================================================================

    /// Analyze a preview window of a file; never fails
    pub fn analyze_file(&self, path: &Path) -> TempoAnalysis {
        let s = &self.config.snippet;
        let loaded = self.load(&LoadRequest::snippet(
            path,
            self.config.sample_rate,
            s.offset_secs,
            s.duration_secs,
        ));
        if loaded.is_fallback() {
            return TempoAnalysis::degraded(s.default_bpm, "unreadable audio");
        }
        self.analyze_buffer(&loaded.buffer)
    }

    /// Analyze an already-decoded buffer; never fails
    pub fn analyze_buffer(&self, buffer: &AudioBuffer) -> TempoAnalysis {
        let s = &self.config.snippet;
        if buffer.len() < s.min_samples || buffer.peak() < s.silence_peak {
            debug!(
                "Degraded analysis: {} samples, peak {:.2e}",
                buffer.len(),
                buffer.peak()
            );
            return TempoAnalysis::degraded(s.default_bpm, "silent or unreadable audio");
        }

        let estimate = self.tempo.estimate(buffer);
        let key = self.key.estimate(buffer).label;

        if !(estimate.is_sufficient() && estimate.bpm.is_finite()) {
            let fallback = self.tempo.fallback_tempo(buffer);
            let bpm = if fallback.is_finite() && fallback > 0.0 {
                fallback
            } else {
                s.default_bpm
            };
            debug!("Fusion produced no tempo; fallback {:.2} BPM", bpm);
            return TempoAnalysis {
                bpm: round2(bpm),
                confidence: FALLBACK_CONFIDENCE,
                alt_bpms: Vec::new(),
                key,
                methods: Vec::new(),
                candidates: Vec::new(),
                note: None,
            };
        }

        let alt_bpms = [estimate.alt_half, estimate.alt_double]
            .into_iter()
            .filter(|alt| *alt > 0.0 && (alt - estimate.bpm).abs() > 1.0)
            .map(round2)
            .collect();

        TempoAnalysis {
            bpm: round2(estimate.bpm),
            confidence: estimate.confidence,
            alt_bpms,
            key,
            methods: estimate.methods.iter().map(|m| m.tag().to_string()).collect(),
            candidates: estimate.candidates,
            note: None,
        }
    }

    // =========================================================================
    // Remix
    // =========================================================================

    /// Remix two decoded buffers: vocal from `vocal`, backing from `inst`
    ///
    /// Fails only when both buffers are empty.
    pub fn remix_buffers(&self, vocal: &AudioBuffer, inst: &AudioBuffer) -> Result<Remix> {
        if vocal.is_empty() && inst.is_empty() {
            return Err(StemmixError::InsufficientSignal {
                reason: "both inputs are empty after decoding".to_string(),
            });
        }
        let start = Instant::now();
        let sr = self.config.sample_rate;
        let vocal = self.at_rate(vocal);
        let inst = self.at_rate(inst);

        let vocal_tempo = self.tempo.estimate(&vocal);
        let inst_tempo = self.tempo.estimate(&inst);
        let vocal_key = self.key.estimate(&vocal);
        let inst_key = self.key.estimate(&inst);
        info!(
            "Vocal: {:.2} BPM, {}; instrumental: {:.2} BPM, {}",
            vocal_tempo.bpm, vocal_key, inst_tempo.bpm, inst_key
        );

        let transform_plan = plan(&vocal_tempo, &vocal_key, &inst_tempo, &inst_key);
        let transformed = self.backends.transformer.apply(&vocal, &transform_plan);

        let aligned = self.aligner.align(&transformed, &inst);
        let (balanced, gain) = match_loudness(&aligned.buffer, &inst, &self.config.mix);
        let audio = mix(&inst, &balanced, &self.config.mix);

        info!(
            "Remix: rate {:.3}, shift {:+} st, offset {:.3}s ({:?}), gain {:.2} in {:.2}s",
            transform_plan.rate_ratio(),
            transform_plan.semitone_shift(),
            aligned.result.offset_seconds,
            aligned.result.method,
            gain,
            start.elapsed().as_secs_f64()
        );

        let result = RemixResult {
            vocal_bpm: vocal_tempo.bpm,
            inst_bpm: inst_tempo.bpm,
            vocal_key: vocal_key.label,
            inst_key: inst_key.label,
            semitone_shift: transform_plan.semitone_shift(),
            applied_rate_ratio: transform_plan.rate_ratio(),
            sample_rate: sr,
            alignment: aligned.result,
            vocal_gain: gain,
            duration_seconds: audio.duration(),
            output_path: None,
        };
        Ok(Remix { audio, result })
    }

    /// Remix a vocal stem file onto an instrumental file
    pub fn remix_files(&self, vocal_path: &Path, inst_path: &Path) -> Result<Remix> {
        let vocal = self.load_whole(vocal_path);
        let inst = self.load_whole(inst_path);
        if vocal.is_empty() && inst.is_empty() {
            return Err(StemmixError::decode_failure(
                vocal_path,
                format!("neither this file nor '{}' produced any audio", inst_path.display()),
            ));
        }
        self.remix_buffers(&vocal, &inst)
    }

    /// Separate two full songs and remix A's vocal onto B's instrumental
    ///
    /// Stems are written below `work_dir`. With `four_stems`, a missing
    /// ready-made instrumental is built by summing bass, drums and other.
    pub fn remix_songs(&self, song_a: &Path, song_b: &Path, work_dir: &Path, four_stems: bool) -> Result<Remix> {
        let separator = &self.backends.separator;
        let stems_a = separator.separate(song_a, &work_dir.join("a"), four_stems)?;
        let stems_b = separator.separate(song_b, &work_dir.join("b"), four_stems)?;

        let vocal_path = stems_a.vocals.ok_or_else(|| StemmixError::StemSeparation {
            reason: format!("no vocal stem found in {}", stems_a.directory.display()),
        })?;
        info!("Vocals: {}", vocal_path.display());

        let inst = match &stems_b.instrumental {
            Some(path) => {
                info!("Instrumental: {}", path.display());
                self.load_whole(path)
            }
            None if four_stems && !stems_b.parts.is_empty() => {
                info!(
                    "Building instrumental from {} of [{}]",
                    stems_b.parts.len(),
                    PART_NAMES.join(", ")
                );
                let parts: Vec<AudioBuffer> = stems_b.parts.iter().map(|p| self.load_whole(p)).collect();
                sum_parts(&parts, self.config.sample_rate)
            }
            None => {
                return Err(StemmixError::StemSeparation {
                    reason: format!("no instrumental stem found in {}", stems_b.directory.display()),
                })
            }
        };

        let vocal = self.load_whole(&vocal_path);
        self.remix_buffers(&vocal, &inst)
    }

    fn at_rate(&self, buffer: &AudioBuffer) -> AudioBuffer {
        let sr = self.config.sample_rate;
        match buffer.sample_rate {
            rate if rate == sr => buffer.clone(),
            0 => {
                warn!("Buffer without a sample rate; assuming {}Hz", sr);
                AudioBuffer::new(buffer.samples.clone(), sr)
            }
            rate => AudioBuffer::new(resample(&buffer.samples, rate, sr), sr),
        }
    }
}

/// Zero-pad parts to the longest, sum, and peak-normalize when above 1.0
pub fn sum_parts(parts: &[AudioBuffer], sample_rate: u32) -> AudioBuffer {
    let len = parts.iter().map(AudioBuffer::len).max().unwrap_or(0);
    let mut out = vec![0.0f32; len];
    for part in parts {
        for (o, s) in out.iter_mut().zip(part.samples.iter()) {
            *o += s;
        }
    }
    let peak = out.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    if peak > 1.0 {
        for s in out.iter_mut() {
            *s /= peak;
        }
    }
    AudioBuffer::new(out, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn engine() -> Engine {
        Engine::builtin(EngineConfig::default())
    }

    #[test]
    fn test_silence_is_degraded() {
        let a = engine().analyze_buffer(&AudioBuffer::silence(44100 * 3, 44100));
        assert_eq!(a.bpm, 120.0);
        assert_eq!(a.confidence, 0.0);
        assert!(a.alt_bpms.is_empty());
        assert_eq!(a.key, "Unknown");
        assert_eq!(a.note.as_deref(), Some("silent or unreadable audio"));
    }

    #[test]
    fn test_short_buffer_is_degraded() {
        let a = engine().analyze_buffer(&AudioBuffer::new(vec![0.5; 4000], 44100));
        assert_eq!(a.bpm, 120.0);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn test_missing_file_is_degraded() {
        let a = engine().analyze_file(&PathBuf::from("/nonexistent/stemmix/track.mp3"));
        assert_eq!(a.bpm, 120.0);
        assert_eq!(a.confidence, 0.0);
        assert!(a.note.is_some());
    }

    #[test]
    fn test_both_empty_fails() {
        let empty = AudioBuffer::silence(0, 44100);
        assert!(engine().remix_buffers(&empty, &empty).is_err());
    }

    #[test]
    fn test_sum_parts_pads_and_normalizes() {
        let parts = vec![
            AudioBuffer::new(vec![0.8, 0.8, 0.8], 44100),
            AudioBuffer::new(vec![0.7], 44100),
        ];
        let out = sum_parts(&parts, 44100);
        assert_eq!(out.len(), 3);
        assert!((out.samples[0] - 1.0).abs() < 1e-6);
        assert!((out.samples[1] - 0.8 / 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_songs_need_a_separator() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = engine()
            .remix_songs(Path::new("a.mp3"), Path::new("b.mp3"), dir.path(), false)
            .unwrap_err();
        assert!(matches!(err, StemmixError::StemSeparation { .. }));
    }
}
