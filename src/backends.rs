//! External backend resolution
//!
//! Each optional tool is probed exactly once, when the engine is built.
//! Unavailable tools are dropped so the built-in algorithm runs directly.

use crate::analysis::{BeatTracker, DemucsSeparator, ExternalBeatTracker, StemSeparator};
use crate::audio::Loader;
use crate::config::BackendSettings;
use crate::transform::{RubberBand, TimePitchBackend, Transformer};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::info;

/// The collaborators an engine runs with
#[derive(Clone)]
pub struct Backends {
    pub loader: Arc<Loader>,
    pub transformer: Transformer,
    pub beat_tracker: Option<Arc<dyn BeatTracker>>,
    pub separator: Arc<dyn StemSeparator>,
}

impl Backends {
    /// In-process algorithms only; no subprocess is ever started
    pub fn builtin() -> Self {
        Self {
            loader: Arc::new(Loader::builtin()),
            transformer: Transformer::builtin(),
            beat_tracker: None,
            separator: Arc::new(DemucsSeparator::disabled()),
        }
    }

    /// Probe the configured tools and keep those that work
    pub fn resolve(settings: &BackendSettings) -> Self {
        if !settings.external_enabled {
            info!("External backends disabled; using built-in algorithms");
            return Self::builtin();
        }

        let loader = if ffmpeg_available(&settings.ffmpeg) {
            Loader::with_ffmpeg(settings.ffmpeg.clone())
        } else {
            Loader::builtin()
        };

        let rubberband: Arc<dyn TimePitchBackend> = Arc::new(RubberBand::probe(settings.rubberband.clone()));
        let tracker: Arc<dyn BeatTracker> = Arc::new(ExternalBeatTracker::probe(settings.beat_tracker.clone()));

        let backends = Self {
            loader: Arc::new(loader),
            transformer: Transformer::with_external(Some(rubberband)),
            beat_tracker: Some(tracker).filter(|t| t.is_available()),
            separator: Arc::new(DemucsSeparator::probe(settings.demucs_python.clone())),
        };
        info!("Backends: {}", backends.describe());
        backends
    }

    /// One-line summary for logging
    pub fn describe(&self) -> String {
        format!(
            "decode [{}], time/pitch {}, beat tracker {}, separator {}",
            self.loader.tier_names().join(", "),
            self.transformer.primary(),
            self.beat_tracker.as_ref().map_or("built-in", |t| t.name()),
            if self.separator.is_available() {
                self.separator.name()
            } else {
                "unavailable"
            }
        )
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::builtin()
    }
}

fn ffmpeg_available(command: &str) -> bool {
    Command::new(command)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends() {
        let b = Backends::builtin();
        assert_eq!(b.loader.tier_names(), vec!["wav", "symphonia"]);
        assert_eq!(b.transformer.primary(), "phase-vocoder");
        assert!(b.beat_tracker.is_none());
        assert!(!b.separator.is_available());
    }

    #[test]
    fn test_disabled_settings_skip_probing() {
        let b = Backends::resolve(&BackendSettings::builtin_only());
        assert!(b.beat_tracker.is_none());
        assert_eq!(b.transformer.primary(), "phase-vocoder");
    }

    #[test]
    fn test_missing_tools_fall_back() {
        let settings = BackendSettings {
            external_enabled: true,
            rubberband: "stemmix-missing-rb".into(),
            beat_tracker: "stemmix-missing-tracker".into(),
            ffmpeg: "stemmix-missing-ffmpeg".into(),
            demucs_python: "stemmix-missing-python".into(),
        };
        let b = Backends::resolve(&settings);
        assert_eq!(b.loader.tier_names(), vec!["wav", "symphonia"]);
        assert_eq!(b.transformer.primary(), "phase-vocoder");
        assert!(b.beat_tracker.is_none());
        assert!(!b.separator.is_available());
    }
}
