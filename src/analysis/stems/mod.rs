//! Stem separation
//!
//! Separation itself is delegated to Demucs run as a subprocess (see
//! [`demucs`]). This module knows how Demucs names its output files and
//! picks the vocal, instrumental and four-stem parts out of a directory.

pub mod demucs;

pub use demucs::DemucsSeparator;

use crate::types::StemSet;
use std::path::{Path, PathBuf};

/// File stems accepted as an isolated vocal
const VOCAL_NAMES: [&str; 4] = ["vocals", "lead_vocals", "vocal", "vox"];

/// Instrumental file stems, most preferred first
const INSTRUMENTAL_NAMES: [&str; 3] = ["no_vocals", "accompaniment", "instrumental"];

/// Parts summed into an instrumental when no ready-made one exists
pub const PART_NAMES: [&str; 3] = ["bass", "drums", "other"];

/// `.wav` files directly inside `dir`, sorted by name
fn wav_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    files.sort();
    files
}

fn stem_lower(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

/// Pick the isolated vocal stem; "no_vocals" never qualifies
pub fn pick_vocals(dir: &Path) -> Option<PathBuf> {
    wav_files(dir).into_iter().find(|f| {
        let stem = stem_lower(f);
        VOCAL_NAMES.contains(&stem.as_str()) || stem.ends_with("- vocals")
    })
}

/// Pick a ready-made instrumental stem
pub fn pick_instrumental(dir: &Path) -> Option<PathBuf> {
    let files = wav_files(dir);
    INSTRUMENTAL_NAMES
        .iter()
        .find_map(|name| files.iter().find(|f| stem_lower(f) == *name).cloned())
        .or_else(|| files.iter().find(|f| stem_lower(f).contains("no_vocals")).cloned())
}

/// The bass/drums/other stems present in `dir`
pub fn pick_parts(dir: &Path) -> Vec<PathBuf> {
    PART_NAMES
        .iter()
        .map(|name| dir.join(format!("{}.wav", name)))
        .filter(|p| p.is_file())
        .collect()
}

/// Collect every recognised stem in a separation output directory
pub fn collect_stems(dir: &Path) -> StemSet {
    StemSet {
        directory: dir.to_path_buf(),
        vocals: pick_vocals(dir),
        instrumental: pick_instrumental(dir),
        parts: pick_parts(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_no_vocals_is_never_the_vocal() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["no_vocals.wav"]);
        assert_eq!(pick_vocals(dir.path()), None);
        assert_eq!(pick_instrumental(dir.path()), Some(dir.path().join("no_vocals.wav")));
    }

    #[test]
    fn test_vocal_name_variants() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["Song - Vocals.wav", "drums.wav"]);
        assert_eq!(pick_vocals(dir.path()), Some(dir.path().join("Song - Vocals.wav")));
    }

    #[test]
    fn test_instrumental_preference_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["instrumental.wav", "accompaniment.wav", "vocals.wav"]);
        assert_eq!(
            pick_instrumental(dir.path()),
            Some(dir.path().join("accompaniment.wav"))
        );
    }

    #[test]
    fn test_instrumental_substring_match() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["track_no_vocals_v2.wav"]);
        assert!(pick_instrumental(dir.path()).is_some());
    }

    #[test]
    fn test_four_stem_collection() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["vocals.wav", "bass.wav", "drums.wav", "other.wav", "notes.txt"]);
        let stems = collect_stems(dir.path());
        assert_eq!(stems.vocals, Some(dir.path().join("vocals.wav")));
        assert_eq!(stems.instrumental, None);
        assert_eq!(stems.parts.len(), 3);
    }
}
