//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

/// Terminal client for an EasyAgent task backend.
#[derive(Debug, Parser)]
#[command(name = "easyagent", version)]
pub struct Args {
    /// Path to config file (default: <config dir>/easyagent/config.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override backend base URL.
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Override session id.
    #[arg(long = "session", global = true)]
    pub session: Option<String>,

    /// Append every received stream event to this JSONL journal.
    #[arg(long = "record", value_name = "PATH", global = true)]
    pub record: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Full-screen terminal UI (default).
    Tui,
    /// Print transcript and run updates as plain lines.
    Watch {
        /// Submit this prompt once connected.
        #[arg(long = "send", value_name = "TEXT")]
        send: Option<String>,
        /// Exit once the run reaches an answer.
        #[arg(long = "exit-on-answer")]
        exit_on_answer: bool,
    },
    /// Fold a recorded journal and print the final view.
    Replay {
        journal: PathBuf,
        /// Write every step screenshot into DIR.
        #[arg(long = "export-frames", value_name = "DIR")]
        export_frames: Option<PathBuf>,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Tui)
    }
}
