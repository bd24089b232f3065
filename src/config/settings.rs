//! Runtime configuration settings

use super::cli::{BackendArgs, Cli};
use super::engine::EngineConfig;
use crate::error::{Result, StemmixError};

/// Commands for the optional external backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// When false every external backend is skipped without probing
    pub external_enabled: bool,
    pub rubberband: String,
    pub beat_tracker: String,
    pub ffmpeg: String,
    /// Python interpreter used as `<python> -m demucs`
    pub demucs_python: String,
}

impl BackendSettings {
    /// Built-in algorithms only
    pub fn builtin_only() -> Self {
        Self {
            external_enabled: false,
            ..Self::default()
        }
    }

    fn from_args(args: &BackendArgs) -> Self {
        let defaults = Self::default();
        Self {
            external_enabled: !args.no_external,
            rubberband: args.rubberband.clone().unwrap_or(defaults.rubberband),
            beat_tracker: args.beat_tracker.clone().unwrap_or(defaults.beat_tracker),
            ffmpeg: args.ffmpeg.clone().unwrap_or(defaults.ffmpeg),
            demucs_python: args.demucs.clone().unwrap_or(defaults.demucs_python),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            external_enabled: true,
            rubberband: "rubberband".to_string(),
            beat_tracker: "DBNBeatTracker".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            demucs_python: "python3".to_string(),
        }
    }
}

/// Runtime settings for the engine and the CLI front end
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineConfig,
    pub backends: BackendSettings,
    /// Number of analysis worker threads
    pub analysis_threads: usize,
    /// Show progress bars
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut engine = EngineConfig::default();

        let (lo, hi) = engine.tempo.band;
        engine.tempo.band = (cli.min_bpm.unwrap_or(lo), cli.max_bpm.unwrap_or(hi));
        if let Some(db) = cli.vocal_level_db {
            engine.mix.vocal_level_db = db;
        }
        if let Some(cap) = cli.gain_cap {
            engine.mix.gain_cap = cap;
        }
        engine.validate().map_err(StemmixError::ConfigError)?;

        let threads = match &cli.command {
            super::cli::Command::Analyze(args) => args.threads,
            super::cli::Command::Remix(_) => None,
        };

        Ok(Self {
            engine,
            backends: BackendSettings::from_args(&cli.backends),
            analysis_threads: threads.unwrap_or_else(default_threads),
            show_progress: !cli.quiet,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            backends: BackendSettings::default(),
            analysis_threads: default_threads(),
            show_progress: true,
        }
    }
}

/// One core is left for the caller
fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
