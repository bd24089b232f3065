//! Demucs separator run as `python -m demucs`

use super::collect_stems;
use crate::analysis::traits::StemSeparator;
use crate::error::{Result, StemmixError};
use crate::types::StemSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;
use tracing::{debug, info};

/// Stem separator backed by the Demucs command line
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    python: String,
    available: bool,
}

impl DemucsSeparator {
    /// Probe `python -m demucs --help` once
    pub fn probe(python: impl Into<String>) -> Self {
        let python = python.into();
        let available = Command::new(&python)
            .args(["-m", "demucs", "--help"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        debug!("Demucs via '{}' available: {}", python, available);
        Self { python, available }
    }

    /// A separator that always reports unavailable
    pub fn disabled() -> Self {
        Self {
            python: String::new(),
            available: false,
        }
    }

    fn command(&self, input_path: &Path, output_dir: &Path, four_stems: bool) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "demucs", "-o"]).arg(output_dir);
        if !four_stems {
            cmd.args(["--two-stems", "vocals"]);
        }
        cmd.arg(input_path);
        if std::env::var_os("OMP_NUM_THREADS").is_none() {
            cmd.env("OMP_NUM_THREADS", "1");
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl StemSeparator for DemucsSeparator {
    fn separate(&self, input_path: &Path, output_dir: &Path, four_stems: bool) -> Result<StemSet> {
        if !self.available {
            return Err(StemmixError::StemSeparation {
                reason: format!(
                    "Demucs is not available for '{}'. Make sure `pip install demucs` and ffmpeg are installed.",
                    input_path.display()
                ),
            });
        }

        std::fs::create_dir_all(output_dir)?;
        info!(
            "Separating {} ({} stems)",
            input_path.display(),
            if four_stems { 4 } else { 2 }
        );

        let output = self
            .command(input_path, output_dir, four_stems)
            .output()
            .map_err(|e| StemmixError::StemSeparation {
                reason: format!("failed to launch {}: {}", self.python, e),
            })?;

        if !output.status.success() {
            return Err(StemmixError::StemSeparation {
                reason: format!(
                    "Demucs failed. Make sure `pip install demucs` and ffmpeg are installed. Details: exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let dir = find_output_dir(output_dir, input_path).ok_or_else(|| StemmixError::StemSeparation {
            reason: format!("Demucs output directory not found under {}", output_dir.display()),
        })?;
        debug!("Demucs wrote stems to {}", dir.display());
        Ok(collect_stems(&dir))
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "demucs"
    }
}

/// Newest `<root>/<model>/<track>` directory, preferring tracks named after the input
pub fn find_output_dir(root: &Path, input_path: &Path) -> Option<PathBuf> {
    let track = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let candidates: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|model| std::fs::read_dir(model).ok())
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();

    let matching: Vec<&PathBuf> = candidates
        .iter()
        .filter(|d| {
            d.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.to_lowercase().contains(&track))
        })
        .collect();
    let pool: Vec<&PathBuf> = if matching.is_empty() {
        candidates.iter().collect()
    } else {
        matching
    };

    pool.into_iter()
        .max_by_key(|d| {
            std::fs::metadata(d)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_output_dir_prefers_matching_track() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("htdemucs/other_song")).unwrap();
        std::fs::create_dir_all(root.path().join("htdemucs/my_song")).unwrap();
        let found = find_output_dir(root.path(), Path::new("/music/My_Song.mp3"));
        assert_eq!(found, Some(root.path().join("htdemucs/my_song")));
    }

    #[test]
    fn test_find_output_dir_empty_root() {
        let root = TempDir::new().unwrap();
        assert_eq!(find_output_dir(root.path(), Path::new("a.wav")), None);
    }

    #[test]
    fn test_disabled_separator_errors() {
        let sep = DemucsSeparator::disabled();
        assert!(!sep.is_available());
        let err = sep
            .separate(Path::new("a.wav"), Path::new("/tmp"), false)
            .unwrap_err();
        assert!(matches!(err, StemmixError::StemSeparation { .. }));
    }

    #[test]
    fn test_two_stem_command_line() {
        let sep = DemucsSeparator {
            python: "python3".into(),
            available: true,
        };
        let cmd = sep.command(Path::new("song.mp3"), Path::new("out"), false);
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-m", "demucs", "-o", "out", "--two-stems", "vocals", "song.mp3"]);
    }
}
