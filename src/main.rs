use anyhow::{Result, bail};
use clap::Parser;
use crossbeam_channel::Receiver;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{error, info};
use vcspool::cli::{CliArgs, CliCommand};
use vcspool::config::Config;
use vcspool::ports::{CompletionHandler, ProcessOutput, join_args};
use vcspool::{FileStatus, Scheduler, VcsError, VersionControl};

enum Outcome {
    Files(Result<Vec<FileStatus>, VcsError>),
    Root(Result<PathBuf, VcsError>),
    Output(ProcessOutput),
}

fn main() -> Result<()> {
    // Initialize tracing with env filter; stdout is reserved for command results
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli_args = CliArgs::parse();
    let command = cli_args.command.clone().unwrap_or(CliCommand::Status);
    let config = Config::from_cli_and_file(&cli_args, cli_args.config.clone())?;

    let vcs = VersionControl::from_config(&config);
    let mut scheduler = Scheduler::with_system_defaults(&config.scheduler.to_scheduler_config());
    info!(
        dialect = %vcs.dialect(),
        repo = %vcs.repo_dir().display(),
        capacity = scheduler.capacity(),
        "Starting vcspool"
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    match command {
        CliCommand::Status => {
            vcs.find_files(&mut scheduler, move |files| {
                let _ = tx.send(Outcome::Files(files));
            });
        }
        CliCommand::Root => {
            vcs.repository_location(&mut scheduler, move |root| {
                let _ = tx.send(Outcome::Root(root));
            });
        }
        CliCommand::Run { args } => {
            let handler: CompletionHandler = Box::new(move |output: ProcessOutput| {
                let _ = tx.send(Outcome::Output(output));
            });
            vcs.run(&mut scheduler, &join_args(&args), Some(handler));
        }
    }

    let report = scheduler.run_until_idle(config.scheduler.poll_interval());
    if let Some((id, err)) = report.failed.first() {
        error!(%id, "Command could not be started: {}", err);
        bail!("{}", err);
    }

    report_outcome(&rx)
}

fn report_outcome(rx: &Receiver<Outcome>) -> Result<()> {
    let Ok(outcome) = rx.try_recv() else {
        bail!("command finished without reporting a result");
    };

    let mut stdout = io::stdout().lock();
    match outcome {
        Outcome::Files(files) => {
            let files = files?;
            if files.is_empty() {
                info!("Working directory clean");
            }
            for file in files {
                writeln!(stdout, "{file}")?;
            }
        }
        Outcome::Root(root) => {
            writeln!(stdout, "{}", root?.display())?;
        }
        Outcome::Output(output) => {
            stdout.write_all(&output.stdout)?;
            io::stderr().write_all(&output.stderr)?;
            if !output.success() {
                bail!("command exited with {:?}", output.code);
            }
        }
    }

    Ok(())
}
