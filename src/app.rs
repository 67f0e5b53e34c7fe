use crate::api::JobApi;
use crate::cli::{Cli, Command, DedupArgs, FetchArgs, HistoryAction, OutputArgs};
use crate::config::options::Options;
use crate::core::dedup::{DedupOutput, deduplicate};
use crate::core::jobs::spawn_poll_job;
use crate::core::metadata::{self, MetadataMap};
use crate::core::parser::{self, detect_sequence_type};
use crate::core::poll::PollState;
use crate::history::{FileStorage, JobEntry, JobHistory};
use color_eyre::{Result, eyre::eyre};
use std::io::Write;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the selected command to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let options = cli.to_options()?;
    debug!(options = ?options, "resolved options");

    match cli.command {
        Command::Dedup(args) => run_dedup(args).await,
        Command::Fetch(args) => run_fetch(args, &options).await,
        Command::History(args) => run_history(&args.action, &options),
    }
}

async fn run_dedup(args: DedupArgs) -> Result<()> {
    let text = parser::read_alignment_text(args.alignment.clone()).await?;
    let metadata = match &args.metadata {
        Some(path) => metadata::load_metadata(path)?,
        None => MetadataMap::new(),
    };

    let output = deduplicate(&text, &metadata);
    info!(
        path = ?args.alignment,
        duplicates_removed = output.duplicates_removed,
        "deduplicated local alignment"
    );
    emit(&output, &args.output)
}

async fn run_fetch(args: FetchArgs, options: &Options) -> Result<()> {
    let api = JobApi::new(&args.api_url, options.request_timeout)?;
    let mut history = JobHistory::new(FileStorage::open(options.history_path.clone())?);
    let mut entry = JobEntry::now(args.job_id.clone(), "pending");
    entry.label.clone_from(&args.label);
    history.record(entry.clone())?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling poll");
            ctrl_c_cancel.cancel();
        }
    });

    let (state_tx, mut state_rx) = mpsc::channel(1);
    spawn_poll_job(
        api.clone(),
        args.job_id.clone(),
        options.poll_interval,
        options.poll_timeout,
        cancel,
        state_tx,
    );
    eprintln!("Waiting for job {}...", args.job_id);

    let state = state_rx
        .recv()
        .await
        .ok_or_else(|| eyre!("Poll task ended without reporting a result"))?;
    entry.status = poll_state_label(&state).to_string();
    history.record(entry)?;

    if state != PollState::Succeeded {
        return Err(eyre!("Job {} did not complete: {}", args.job_id, state));
    }

    let result = api.result(&args.job_id).await?;
    let output = deduplicate(&result.alignment, &result.metadata);
    info!(
        job_id = %args.job_id,
        duplicates_removed = output.duplicates_removed,
        "deduplicated job result"
    );
    emit(&output, &args.output)
}

fn poll_state_label(state: &PollState) -> &'static str {
    match state {
        PollState::Idle => "idle",
        PollState::Polling { .. } => "polling",
        PollState::Succeeded => "completed",
        PollState::Failed { .. } => "failed",
        PollState::TimedOut { .. } => "timed out",
        PollState::Cancelled => "cancelled",
    }
}

fn run_history(action: &HistoryAction, options: &Options) -> Result<()> {
    let mut history = JobHistory::new(FileStorage::open(options.history_path.clone())?);
    match action {
        HistoryAction::List => {
            let mut stdout = std::io::stdout().lock();
            for entry in history.list() {
                writeln!(
                    stdout,
                    "{}\t{}\t{}\t{}",
                    entry.id,
                    entry.status,
                    entry.recorded_at,
                    entry.label.as_deref().unwrap_or("")
                )?;
            }
        }
        HistoryAction::Remove { job_id } => {
            if !history.remove(job_id)? {
                return Err(eyre!("No job {} in history", job_id));
            }
        }
        HistoryAction::Clear => history.clear()?,
    }
    Ok(())
}

/// Writes the alignment and metadata where `args` asks and prints a summary to stderr.
fn emit(output: &DedupOutput, args: &OutputArgs) -> Result<()> {
    match &args.output {
        Some(path) => std::fs::write(path, &output.alignment_text)
            .map_err(|e| eyre!("Failed to write alignment {:?}: {}", path, e))?,
        None => std::io::stdout()
            .lock()
            .write_all(output.alignment_text.as_bytes())?,
    }
    if let Some(path) = &args.metadata_out {
        metadata::write_metadata(path, &output.metadata)?;
    }

    eprintln!("{}", summary(output));
    Ok(())
}

/// One line description of a deduplication result.
#[must_use]
pub fn summary(output: &DedupOutput) -> String {
    let rows = parser::parse_clustal(&output.alignment_text);
    if rows.is_empty() {
        return "No sequences found".to_string();
    }
    format!(
        "Kept {} {} sequences, removed {} duplicate references",
        rows.len(),
        detect_sequence_type(&rows),
        output.duplicates_removed
    )
}
