//! stemmix CLI entry point

use clap::Parser;
use stemmix::audio::write_wav;
use stemmix::config::cli::{AnalyzeArgs, Command, RemixArgs};
use stemmix::config::{Cli, Settings};
use stemmix::export::{remix_output_paths, write_analysis_report, write_remix_report};
use stemmix::pipeline::{analyze_files, Engine};
use stemmix::Result;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    let settings = match Settings::from_cli(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match &cli.command {
        Command::Analyze(args) => run_analyze(args, &settings),
        Command::Remix(args) => {
            validate_remix(args).and_then(|()| run_remix(args, &settings).map_err(|e| e.to_string()))
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_target(false)
        .init();
}

fn run_analyze(args: &AnalyzeArgs, settings: &Settings) -> std::result::Result<(), String> {
    let engine = Engine::from_settings(settings);
    let records = analyze_files(&engine, &args.files, settings.analysis_threads, settings.show_progress)
        .map_err(|e| e.to_string())?;

    match &args.json {
        Some(path) => write_analysis_report(&records, path).map_err(|e| e.to_string()),
        None => {
            let json = serde_json::to_string_pretty(&records).map_err(|e| e.to_string())?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn validate_remix(args: &RemixArgs) -> std::result::Result<(), String> {
    for input in [&args.vocals, &args.instrumental] {
        if !input.exists() {
            return Err(format!(
                "Input file does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Example:\n    stemmix remix --vocals a_vocals.wav --instrumental b_inst.wav -o ./out",
                input.display()
            ));
        }
    }
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  Tip: The output directory will be created automatically,\n  but its parent directory must exist.\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }
    Ok(())
}

fn run_remix(args: &RemixArgs, settings: &Settings) -> Result<()> {
    let engine = Engine::from_settings(settings);
    std::fs::create_dir_all(&args.output).map_err(|e| stemmix::StemmixError::output_error(&args.output, e))?;

    let mut remix = if args.separate {
        let scratch = tempfile::Builder::new().prefix("stemmix-stems").tempdir()?;
        engine.remix_songs(&args.vocals, &args.instrumental, scratch.path(), args.four_stems)?
    } else {
        engine.remix_files(&args.vocals, &args.instrumental)?
    };

    let (wav_path, json_path) = remix_output_paths(&args.output);
    write_wav(&remix.audio, &wav_path)?;
    remix.result.output_path = Some(wav_path.clone());
    write_remix_report(&remix.result, engine.config(), &json_path)?;

    let r = &remix.result;
    println!();
    println!(
        "Vocal {:.2} BPM ({}) -> instrumental {:.2} BPM ({})",
        r.vocal_bpm, r.vocal_key, r.inst_bpm, r.inst_key
    );
    println!(
        "Rate {:.3}, shift {:+} semitones, offset {:.3}s, vocal gain {:.2}",
        r.applied_rate_ratio, r.semitone_shift, r.alignment.offset_seconds, r.vocal_gain
    );
    println!("Wrote {} ({:.1}s)", wav_path.display(), r.duration_seconds);
    Ok(())
}
