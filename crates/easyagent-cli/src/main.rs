mod cli;
mod config;
mod logging;
mod plain;
mod replay;
mod session;
mod ui;
mod view;

use clap::Parser;

use easyagent_core::EventJournal;
use easyagent_core::SessionId;

use crate::cli::Args;
use crate::cli::Command;
use crate::logging::LogTarget;
use crate::session::Session;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::resolve(&args)?;
    let command = args.command();

    let target = match command {
        Command::Tui => LogTarget::File(
            config
                .log
                .file
                .clone()
                .unwrap_or_else(config::default_log_path),
        ),
        Command::Watch { .. } | Command::Replay { .. } => LogTarget::Stderr,
    };
    logging::init(&config.log.level, target)?;
    tracing::debug!(base_url = %config.server.base_url, "config resolved");

    if let Command::Replay {
        journal,
        export_frames,
    } = &command
    {
        let session_id = SessionId::new(config.server.session_id.clone());
        return replay::run(journal, export_frames.as_deref(), session_id);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("easyagent-io")
        .build()?;
    let journal = args.record.as_ref().map(EventJournal::open).transpose()?;
    let session = Session::connect(&config, runtime.handle().clone(), journal)?;

    let result = match command {
        Command::Tui => ui::run(session),
        Command::Watch {
            send,
            exit_on_answer,
        } => plain::run(session, send, exit_on_answer),
        Command::Replay { .. } => Ok(()),
    };
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    result
}
