//! Parallel tempo analysis of many files
//!
//! Each file is an independent request; results keep input order and a
//! bad file only degrades its own entry.

use super::Engine;
use crate::error::{Result, StemmixError};
use crate::types::TempoAnalysis;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Analysis of one input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub analysis: TempoAnalysis,
}

/// Build a dedicated rayon pool for a batch
fn build_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("stemmix-analyze-{}", i))
        .build()
        .map_err(|e| StemmixError::ConfigError(format!("Failed to configure thread pool: {}", e)))?;
    debug!("Configured thread pool with {} threads", pool.current_num_threads());
    Ok(pool)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Analyze `files` on `threads` workers
pub fn analyze_files(
    engine: &Engine,
    files: &[PathBuf],
    threads: usize,
    show_progress: bool,
) -> Result<Vec<AnalysisRecord>> {
    let pool = build_thread_pool(threads)?;
    let start = Instant::now();
    let pb = show_progress.then(|| progress_bar(files.len()));

    let records: Vec<AnalysisRecord> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let analysis = engine.analyze_file(path);
                if let Some(pb) = &pb {
                    pb.inc(1);
                    pb.set_message(path.file_name().unwrap_or_default().to_string_lossy().into_owned());
                }
                AnalysisRecord {
                    path: path.clone(),
                    analysis,
                }
            })
            .collect()
    });

    if let Some(pb) = pb {
        pb.finish_with_message("Analysis complete");
    }

    let degraded = records.iter().filter(|r| r.analysis.note.is_some()).count();
    info!(
        "Analyzed {} files in {:.2}s ({} degraded)",
        records.len(),
        start.elapsed().as_secs_f64(),
        degraded
    );
    Ok(records)
}
