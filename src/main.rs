use alnprune::{app, cli::Cli, logging};
use clap::Parser;
use color_eyre::Result;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _log_guard = if cli.debug {
        Some(logging::init_debug_tracing()?)
    } else {
        None
    };
    info!(command = ?cli.command, "starting alnprune");

    let result = app::run(cli).await;
    if let Err(error_value) = &result {
        error!(error = ?error_value, "alnprune exited with error");
    }
    result
}
