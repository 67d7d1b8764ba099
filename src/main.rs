//! task-recur command-line entry point.

use chrono::DateTime;
use clap::Parser;
use std::process::ExitCode;
use task_recur::cli::{Cli, Command};
use task_recur::clock::{Clock, FakeClock, SystemClock};
use task_recur::config::ConfigLoader;
use task_recur::engine::Engine;
use task_recur::error::{RecurError, RecurResult};
use task_recur::format;
use task_recur::logging;
use task_recur::propagate::{Confirm, FixedAnswer, StdinConfirm};
use tracing::{debug, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log, cli.verbose) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

/// Fixed clock from `TASK_RECUR_FAKETIME` (RFC 3339), otherwise the wall clock.
fn clock_from_env() -> RecurResult<Box<dyn Clock>> {
    match std::env::var("TASK_RECUR_FAKETIME") {
        Ok(value) => {
            let now = DateTime::parse_from_rfc3339(value.trim())
                .map_err(|_| RecurError::InvalidDate(value.clone()))?
                .to_utc();
            debug!(%now, "using fixed clock");
            Ok(Box::new(FakeClock::new(now)))
        }
        Err(_) => Ok(Box::new(SystemClock)),
    }
}

fn run(cli: Cli) -> RecurResult<()> {
    let mut loader = ConfigLoader::load(cli.config.as_deref().map(std::path::Path::new))?;
    for source in loader.sources() {
        debug!(path = %source.display(), "config source");
    }

    if let Some(db_path) = &cli.database {
        loader.config_mut().store.db_path = db_path.into();
    }
    loader.apply_cli_overrides(&cli.rc)?;
    let config = loader.into_config();

    let confirm: Box<dyn Confirm> = match cli.scripted_answer() {
        Some(answer) => Box::new(FixedAnswer(answer)),
        None => Box::new(StdinConfirm),
    };
    let mut engine = Engine::open(config, clock_from_env()?, confirm)?;

    match cli.command {
        Command::Add(args) => {
            let task = engine.add(&args.description(), &args.fields.to_task_args(None))?;
            print!("{}", format::format_changed_markdown("add", std::slice::from_ref(&task)));
        }
        Command::List(args) => {
            let tasks = engine.list(args.sort_key())?;
            if args.json {
                println!("{}", format::to_json(&tasks));
            } else {
                print!("{}", format::format_tasks_markdown(&tasks));
            }
        }
        Command::Count => {
            println!("{}", engine.count()?);
        }
        Command::Modify(args) => {
            let outcome = engine.modify(
                &args.id,
                &args.fields.to_task_args(args.description.clone()),
            )?;
            print!("{}", format::format_changed_markdown("modify", &outcome.changed));
        }
        Command::Delete(args) => {
            let outcome = engine.delete(&args.id)?;
            print!("{}", format::format_changed_markdown("delete", &outcome.changed));
        }
        Command::Done(args) => {
            let task = engine.done(&args.id)?;
            print!("{}", format::format_changed_markdown("done", std::slice::from_ref(&task)));
        }
        Command::Gc => {
            let report = engine.gc()?;
            println!(
                "Generated {} instance(s), expired {}.",
                report.generated, report.expired
            );
        }
        Command::Diag(args) => {
            let report = engine.diag()?;
            if args.json {
                println!("{}", format::to_json(&report));
            } else {
                print!("{}", format::format_report_markdown(&report));
            }
            if !report.is_ok() {
                warn!("integrity violations found");
                report.into_result()?;
            }
        }
    }

    Ok(())
}
