//! Analysis trait abstractions
//!
//! These traits define the interface for optional external backends.
//! Each has a capability check; callers always hold a built-in fallback.

use crate::error::Result;
use crate::types::{AudioBuffer, StemSet};
use std::path::Path;

/// Beat tracking backend (neural/statistical trackers run as black boxes)
pub trait BeatTracker: Send + Sync {
    /// Beat times in seconds, ascending
    fn track(&self, buffer: &AudioBuffer) -> Result<Vec<f64>>;

    /// Check if the tracker can run on this host
    fn is_available(&self) -> bool;

    /// Get the name of this tracker (for logging)
    fn name(&self) -> &'static str;
}

/// Stem separation backend
pub trait StemSeparator: Send + Sync {
    /// Separate audio into named stems
    ///
    /// # Arguments
    /// * `input_path` - Path to the source audio file
    /// * `output_dir` - Directory to write stem files
    /// * `four_stems` - Request bass/drums/other/vocals instead of vocals/no_vocals
    ///
    /// # Returns
    /// The stems that were found after separation
    fn separate(&self, input_path: &Path, output_dir: &Path, four_stems: bool) -> Result<StemSet>;

    /// Check if the separator is available (tool installed, model present)
    fn is_available(&self) -> bool;

    /// Get the name of this separator (for logging)
    fn name(&self) -> &'static str;
}
