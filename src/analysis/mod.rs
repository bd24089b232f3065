//! Audio analysis modules
//!
//! Tempo and key estimation run entirely in-process. Optional external
//! backends (beat tracker, stem separator) sit behind the traits in
//! [`traits`]; the estimators always work without them.

pub mod beat;
pub mod external;
pub mod key;
pub mod stems;
pub mod tempo;
pub mod traits;

pub use beat::{track_beats, BeatGrid, TrackerParams};
pub use external::ExternalBeatTracker;
pub use key::KeyEstimator;
pub use stems::DemucsSeparator;
pub use tempo::{fold_bpm, TempoEstimator};
pub use traits::{BeatTracker, StemSeparator};
