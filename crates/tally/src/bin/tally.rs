use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;
use tally::core::ParamsError;
use tally::io::{write_report, ReplayError, ReplaySource, TallyConfig, TallyIoError};
use tally::{CountingEngine, CountingParams, CycleStatus};

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Count fruit crossing a line and estimate their total weight"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded detection session through the counting engine.
    Run {
        /// Station settings (JSON).
        #[arg(long)]
        config: PathBuf,
        /// Recorded frames (JSON). Overrides `frames_path` from the config.
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Where to write the session report. Overrides `report_path`.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Log every cycle.
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print a settings file with every default filled in.
    Defaults,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("config: {0}")]
    Config(TallyIoError),
    #[error("invalid parameters: {0}")]
    Params(#[from] ParamsError),
    #[error("recording: {0}")]
    Replay(#[from] ReplayError),
    #[error("report: {0}")]
    Report(TallyIoError),
    #[error("no recording given: pass --frames or set frames_path in the config")]
    MissingFrames,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<(), CliError> {
    match command {
        Command::Run {
            config,
            frames,
            report,
            verbose,
        } => run(config, frames, report, verbose),
        Command::Defaults => {
            let config = TallyConfig {
                params: CountingParams::default(),
                ..TallyConfig::default()
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run(
    config_path: PathBuf,
    frames: Option<PathBuf>,
    report: Option<PathBuf>,
    verbose: bool,
) -> Result<(), CliError> {
    tally::core::init_station(verbose);

    let config = TallyConfig::load_json(&config_path).map_err(CliError::Config)?;
    let frames_path = frames
        .or_else(|| config.frames_path())
        .ok_or(CliError::MissingFrames)?;
    let report_path = report.or_else(|| config.report_path());

    let mut engine = CountingEngine::new(config.params)?;
    let mut source = ReplaySource::load_json(&frames_path)?;
    info!(
        "replaying {} frames from {}",
        source.remaining(),
        frames_path.display()
    );

    while !source.is_exhausted() {
        let out = engine.cycle(&mut source);
        if out.status == CycleStatus::NoInput && !verbose {
            continue;
        }
        // a rebuild may consume a second frame within the same cycle
        println!(
            "frame {:>5}  {:<13} count {:>5}  weight {:>10.1} g  tracking {}",
            source.polled(),
            format!("{:?}", out.status),
            out.count,
            out.total_weight,
            out.tracked_profiles.len()
        );
    }
    engine.stop();

    let summary = engine.session_report();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if let Some(path) = report_path {
        write_report(&summary, &path).map_err(CliError::Report)?;
        info!("report written to {}", path.display());
    }
    Ok(())
}
