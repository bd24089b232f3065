//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// stemmix - Two-song remix engine
///
/// Estimates tempo and key of a vocal source and an instrumental bed,
/// stretches and shifts the vocal to fit, aligns it on the beat grid and
/// writes the mixdown.
#[derive(Parser, Debug)]
#[command(name = "stemmix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars and non-error logs)
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Lower edge of the tempo folding band
    #[arg(long, global = true, value_name = "BPM")]
    pub min_bpm: Option<f64>,

    /// Upper edge of the tempo folding band
    #[arg(long, global = true, value_name = "BPM")]
    pub max_bpm: Option<f64>,

    /// Target vocal level relative to the instrumental (dB)
    #[arg(long, global = true, value_name = "DB", allow_hyphen_values = true)]
    pub vocal_level_db: Option<f64>,

    /// Upper bound on the vocal gain factor
    #[arg(long, global = true, value_name = "GAIN")]
    pub gain_cap: Option<f64>,

    #[command(flatten)]
    pub backends: BackendArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tempo-only analysis of one or more files (never fails on bad input)
    Analyze(AnalyzeArgs),
    /// Fit the vocals of one song onto the instrumental of another
    Remix(RemixArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Audio files to analyze
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Write the analysis as JSON to this path instead of stdout
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RemixArgs {
    /// Vocal source (an isolated vocal stem, or a full song with --separate)
    #[arg(long, value_name = "FILE")]
    pub vocals: PathBuf,

    /// Instrumental bed (an instrumental stem, or a full song with --separate)
    #[arg(long, value_name = "FILE")]
    pub instrumental: PathBuf,

    /// Output directory for the mix and its JSON report
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Run stem separation on both inputs first
    #[arg(long, default_value = "false")]
    pub separate: bool,

    /// Separate into four stems and sum bass, drums and other
    #[arg(long, default_value = "false", requires = "separate")]
    pub four_stems: bool,
}

/// External backend selection
#[derive(Args, Debug, Default)]
pub struct BackendArgs {
    /// Use only the built-in algorithms
    #[arg(long, global = true, default_value = "false")]
    pub no_external: bool,

    /// Rubber Band command line tool
    #[arg(long, global = true, value_name = "CMD")]
    pub rubberband: Option<String>,

    /// External beat tracker (madmom DBNBeatTracker-compatible)
    #[arg(long, global = true, value_name = "CMD")]
    pub beat_tracker: Option<String>,

    /// ffmpeg binary used for fast decoding
    #[arg(long, global = true, value_name = "CMD")]
    pub ffmpeg: Option<String>,

    /// Python interpreter that has demucs installed
    #[arg(long, global = true, value_name = "PYTHON")]
    pub demucs: Option<String>,
}

impl Cli {
    /// Get the log filter based on verbosity flags
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remix() {
        let cli = Cli::try_parse_from([
            "stemmix",
            "remix",
            "--vocals",
            "a.wav",
            "--instrumental",
            "b.wav",
            "-o",
            "out",
            "--vocal-level-db",
            "-3",
        ])
        .expect("valid args");
        assert_eq!(cli.vocal_level_db, Some(-3.0));
        match cli.command {
            Command::Remix(args) => {
                assert_eq!(args.vocals, PathBuf::from("a.wav"));
                assert!(!args.separate);
            }
            _ => panic!("expected remix"),
        }
    }

    #[test]
    fn test_four_stems_requires_separate() {
        let res = Cli::try_parse_from([
            "stemmix",
            "remix",
            "--vocals",
            "a.wav",
            "--instrumental",
            "b.wav",
            "-o",
            "out",
            "--four-stems",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_log_filter() {
        let cli = Cli::try_parse_from(["stemmix", "-vv", "analyze", "a.wav"]).expect("valid args");
        assert_eq!(cli.log_filter(), "debug");
        let cli = Cli::try_parse_from(["stemmix", "-q", "analyze", "a.wav"]).expect("valid args");
        assert_eq!(cli.log_filter(), "error");
    }
}
