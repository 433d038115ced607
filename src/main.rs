//! Command-line front end: queue NCM files and dump them in one go.
//!
//! Positional paths behave like files dropped onto the window, `--file`
//! answers the file picker, and `--output` (or `output_dir` in the
//! configuration) answers the output directory prompt.

mod backend;
mod error;

use crate::backend::{LocalEnumerator, LogNotifier, NcmDumper, PresetDialogs};
use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser};
use exn::ResultExt;
use ncmdrop_config::Config;
use ncmdrop_queue::backend::Collaborators;
use ncmdrop_queue::{BatchOutcome, BatchProgress, Controller, DragDropEvent, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Files or directories to queue, as if dropped onto the window.
    paths: Vec<PathBuf>,
    /// Queue a file as if picked in the file dialog. Repeatable.
    #[arg(short, long = "file", value_name = "FILE")]
    files: Vec<PathBuf>,
    /// Where dumped files go. Created if missing.
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Extra configuration file, merged over the user configuration.
    #[arg(short, long, value_name = "FILE", env = "NCMDROP_CONFIG")]
    config: Option<PathBuf>,
    /// More logging: once for debug, twice for trace. `RUST_LOG` wins.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(log_level: &str, verbose: u8) {
    let default = match verbose {
        0 => log_level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn settings(config: &Config) -> Settings {
    Settings {
        extensions: config.extensions.clone(),
        completion_title: config.completion_title.clone(),
        completion_message: config.completion_message.clone(),
    }
}

/// Feed the dropped paths through the event channel, then queue picked
/// files and run one batch.
async fn session(controller: &Controller, paths: Vec<String>) -> Result<BatchOutcome> {
    let (events, receiver) = mpsc::channel(4);
    let subscription = controller.subscribe(receiver).or_raise(|| ErrorKind::Session)?;
    if !paths.is_empty() {
        for event in [DragDropEvent::HoverStart, DragDropEvent::Drop { paths }] {
            if events.send(event).await.is_err() {
                exn::bail!(ErrorKind::Session);
            }
        }
    }
    drop(events);
    subscription.join().await;
    controller.wait_idle().await;

    controller.select_files().await;
    let status = controller.status();
    tracing::info!(queued = status.queue.len(), "Queue ready");

    let mut published = controller.watch();
    let reporter = tokio::spawn(async move {
        let mut last = BatchProgress::IDLE;
        while published.changed().await.is_ok() {
            let progress = published.borrow_and_update().progress;
            if progress != last && progress != BatchProgress::IDLE {
                tracing::info!(%progress, "Dumping");
            }
            last = progress;
        }
    });
    let outcome = controller.run_batch().await;
    reporter.abort();
    Ok(outcome)
}

fn exit_code(outcome: &BatchOutcome) -> ExitCode {
    match outcome {
        BatchOutcome::Empty => {
            tracing::warn!("Nothing to dump");
            ExitCode::SUCCESS
        },
        BatchOutcome::Aborted => {
            tracing::error!("No output directory; pass --output or set output_dir");
            ExitCode::from(2)
        },
        BatchOutcome::Busy => ExitCode::FAILURE,
        BatchOutcome::Completed(report) => {
            let mut failed = 0usize;
            for file in report.failed() {
                failed += 1;
                tracing::warn!(path = %file.path, error = file.error.as_deref().unwrap_or_default(), "Not dumped");
            }
            tracing::info!(succeeded = report.succeeded(), failed, output_dir = %report.output_dir, "Done");
            if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    init_tracing(&config.log_level, cli.verbose);
    tracing::debug!(?config, "Configuration loaded");

    let output_dir = cli.output.or_else(|| config.output_dir.clone());
    if let Some(dir) = &output_dir {
        tokio::fs::create_dir_all(dir).await.or_raise(|| ErrorKind::OutputDir(dir.clone()))?;
    }

    let collaborators = Collaborators {
        enumerator: Arc::new(LocalEnumerator::new(config.extensions.clone())),
        dumper: Arc::new(NcmDumper),
        dialogs: Arc::new(PresetDialogs::new(cli.files, output_dir)),
        notifier: Arc::new(LogNotifier),
    };
    let controller = Controller::new(collaborators, settings(&config));
    let paths = cli
        .paths
        .into_iter()
        .filter_map(|path| match path.into_os_string().into_string() {
            Ok(path) => Some(path),
            Err(path) => {
                tracing::warn!(path = ?path, "Ignoring path that is not valid UTF-8");
                None
            },
        })
        .collect();

    let outcome = session(&controller, paths).await?;
    Ok(exit_code(&outcome))
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ncmdrop: {err:?}");
            ExitCode::FAILURE
        },
    }
}
