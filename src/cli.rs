use crate::config::options::Options;
use clap::{Args, Parser, Subcommand};
use color_eyre::{Result, eyre::eyre};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Write debug logs to alnprune.log in the working directory
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove duplicate reference rows from a local CLUSTAL alignment
    Dedup(DedupArgs),
    /// Wait for an alignment job to finish, then fetch and deduplicate its result
    Fetch(FetchArgs),
    /// Inspect or edit the job history
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the alignment here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the pruned metadata (JSON) here
    #[arg(long, value_name = "FILE")]
    pub metadata_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DedupArgs {
    /// Path to the CLUSTAL alignment file
    #[arg(value_name = "ALIGNMENT")]
    pub alignment: PathBuf,

    /// Per-sequence metadata (JSON object keyed by sequence id)
    #[arg(short, long, value_name = "FILE")]
    pub metadata: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Job identifier returned on submission
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    /// Base URL of the job service
    #[arg(long, value_name = "URL")]
    pub api_url: String,

    /// Seconds between status checks
    #[arg(long, default_value_t = 5)]
    pub interval: u64,

    /// Seconds before giving up on the job
    #[arg(long, default_value_t = 3600)]
    pub timeout: u64,

    /// Seconds before a single request is abandoned
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    /// Label stored with the job in the history
    #[arg(long)]
    pub label: Option<String>,

    /// Job history file
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Job history file
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    /// List recorded jobs, newest first
    List,
    /// Forget one job
    Remove { job_id: String },
    /// Forget all jobs
    Clear,
}

impl Cli {
    /// Collects the polling and storage settings for the selected command.
    pub fn to_options(&self) -> Result<Options> {
        let mut options = Options::default();

        match &self.command {
            Command::Dedup(_) => {}
            Command::Fetch(args) => {
                if args.interval == 0 {
                    return Err(eyre!("Poll interval must be at least one second."));
                }
                if args.request_timeout == 0 {
                    return Err(eyre!("Request timeout must be at least one second."));
                }
                options.poll_interval = Duration::from_secs(args.interval);
                options.poll_timeout = Duration::from_secs(args.timeout);
                options.request_timeout = Duration::from_secs(args.request_timeout);
                if let Some(path) = &args.history {
                    options.history_path.clone_from(path);
                }
            }
            Command::History(args) => {
                if let Some(path) = &args.history {
                    options.history_path.clone_from(path);
                }
            }
        }

        Ok(options)
    }
}
