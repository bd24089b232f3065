//! stemmix - Two-song audio remix engine
//!
//! Estimates tempo and key of a vocal source and an instrumental bed,
//! plans a time-stretch and pitch-shift that fits the vocal to the bed,
//! aligns it on the instrumental's beat grid, matches loudness and mixes.
//! A tempo-only analysis path serves previews and never fails.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing, runtime settings, engine constants
//! - `audio`: tiered decoding (ffmpeg, WAV, symphonia), resampling, WAV output
//! - `dsp`: STFT, mel filterbank, HPSS, onset envelopes, peaks, correlation
//! - `analysis`: tempo voting, beat tracking, key estimation, external tools
//! - `transform`: transform planner, phase vocoder, Rubber Band backend
//! - `align`: beat-anchored and cross-correlation alignment
//! - `mix`: loudness matching and mixdown
//! - `backends`: one-time probing of optional external tools
//! - `pipeline`: the `Engine` and parallel batch analysis
//! - `export`: JSON reports
//!
//! # Example
//!
//! ```no_run
//! use stemmix::{config::EngineConfig, pipeline::Engine};
//! use std::path::Path;
//!
//! let engine = Engine::builtin(EngineConfig::default());
//! let remix = engine
//!     .remix_files(Path::new("vocals.wav"), Path::new("instrumental.wav"))
//!     .expect("Remix failed");
//! println!("Stretched by {:.3}", remix.result.applied_rate_ratio);
//! ```

pub mod align;
pub mod analysis;
pub mod audio;
pub mod backends;
pub mod config;
pub mod dsp;
pub mod error;
pub mod export;
pub mod mix;
pub mod pipeline;
pub mod transform;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, StemmixError};
pub use pipeline::{Engine, Remix};
pub use types::{AudioBuffer, KeyEstimate, RemixResult, TempoAnalysis, TempoEstimate, TransformPlan};
