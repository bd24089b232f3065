//! JSON reports for remixes and batch analyses

use crate::config::EngineConfig;
use crate::error::{Result, StemmixError};
use crate::pipeline::AnalysisRecord;
use crate::types::RemixResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// stemmix version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
}

impl ReportMetadata {
    fn now() -> Self {
        Self {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Report written next to a remix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemixReport {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ReportMetadata,
    pub remix: RemixResult,
    /// Effective engine configuration
    pub config: EngineConfig,
}

/// Report for a batch of tempo analyses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub version: String,
    pub metadata: ReportMetadata,
    pub file_count: usize,
    pub files: Vec<AnalysisRecord>,
}

/// Write a remix report
pub fn write_remix_report(result: &RemixResult, config: &EngineConfig, output_path: &Path) -> Result<()> {
    let report = RemixReport {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata::now(),
        remix: result.clone(),
        config: config.clone(),
    };
    write_atomic(&report, output_path)?;
    info!("Wrote remix report to {}", output_path.display());
    Ok(())
}

/// Write a batch analysis report
pub fn write_analysis_report(records: &[AnalysisRecord], output_path: &Path) -> Result<()> {
    let report = AnalysisReport {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata::now(),
        file_count: records.len(),
        files: records.to_vec(),
    };
    write_atomic(&report, output_path)?;
    info!("Wrote {} analyses to {}", records.len(), output_path.display());
    Ok(())
}

/// Read a remix report back
pub fn read_remix_report(path: &Path) -> Result<RemixReport> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Serialize to a temp file in the same directory, then rename over the target
fn write_atomic<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| StemmixError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemmixError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemmixError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })
}
