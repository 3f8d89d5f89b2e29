mod commands;
mod logging;
mod progress;

use std::process;

use bids_fixup_core::{imaging, AppConfig, SessionEngine, SessionResult};
use clap::error::ErrorKind;
use clap::Parser;
use colored::*;
use commands::Cli;
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                process::exit(1);
            }
        },
    };

    let _guard = logging::init_logger(args.is_verbose());

    let config = match bids_fixup_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let provider = match imaging::select_provider(&config) {
        Ok(provider) => provider,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    if let Err(err) = run_session(&args, config, provider) {
        error!("Error: {}", err);
        process::exit(1);
    }

    Ok(())
}

fn run_session(
    args: &Cli,
    config: AppConfig,
    provider: Box<dyn bids_fixup_core::ImageInfoProvider>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = SessionEngine::new(config, provider);
    let reporter = CliReporter::new();
    let result = engine.run(&args.session, &reporter)?;

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &SessionResult) {
    println!();
    info!(
        "Volumes: {}, Field maps: {}, Task names: {}",
        format!("{:.2}s", result.volume_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.association_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.task_name_duration.as_secs_f64()).green(),
    );
    info!(
        "{} of {} functional sidecars annotated with volume counts",
        format!("{}", result.volumes.annotated).cyan(),
        format!("{}", result.layout.functional.len()).cyan(),
    );

    let association = &result.association;
    for group in &association.groups {
        info!(
            "acq-{} run-{}: {} field map(s) -> {} scan(s)",
            group.acquisition,
            group.run,
            format!("{}", group.fieldmaps.len()).green(),
            format!("{}", group.intended_for.len()).green(),
        );
    }
    info!(
        "{} field map(s) without IntendedFor, {} scan(s) without a field map",
        format!("{}", association.unassigned_fieldmaps.len()).yellow(),
        format!("{}", association.unmatched_scans.len()).yellow(),
    );
    if !association.duplicates.is_empty() {
        warn!(
            "{} IntendedFor entries were already present and skipped",
            format!("{}", association.duplicates.len()).yellow(),
        );
    }

    info!(
        "{} task name placeholder(s) fixed",
        format!("{}", result.task_names.fixed.len()).cyan(),
    );

    let failed = result.volumes.failed + association.failed + result.task_names.failed;
    if failed > 0 {
        warn!(
            "{} document(s) skipped after errors, see log",
            format!("{}", failed).red()
        );
    }
}
