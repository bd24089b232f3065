//! Output naming and JSON report export

pub mod json;

pub use json::{read_remix_report, write_analysis_report, write_remix_report, AnalysisReport, RemixReport};

use std::path::{Path, PathBuf};

/// Fresh `remix_<8 hex>.wav` and matching `.json` paths inside `dir`
///
/// The random part comes from a v4 UUID, so concurrent requests sharing
/// a directory do not collide.
pub fn remix_output_paths(dir: &Path) -> (PathBuf, PathBuf) {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let stem = format!("remix_{}", &id[..8]);
    (dir.join(format!("{}.wav", stem)), dir.join(format!("{}.json", stem)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remix_output_paths() {
        let (wav, json) = remix_output_paths(Path::new("out"));
        let name = wav.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("remix_") && name.ends_with(".wav"));
        assert_eq!(name.len(), "remix_".len() + 8 + ".wav".len());
        assert!(name[6..14].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(json, wav.with_extension("json"));
    }

    #[test]
    fn test_remix_output_paths_are_unique() {
        let (a, _) = remix_output_paths(Path::new("."));
        let (b, _) = remix_output_paths(Path::new("."));
        assert_ne!(a, b);
    }
}
