use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// fallback filter used when `RUST_LOG` env is not set.
const DEFAULT_LOG_LEVEL: &str = "alnprune=debug";
/// base filename used for debug log output.
const LOG_BASENAME: &str = "alnprune.log";

/// Creates a new log file in the working directory without touching earlier runs.
///
/// The first run writes `alnprune.log`; while that exists, later runs take the first free
/// `alnprune.N.log` with `N` counting up from 1. `create_new` makes the existence check and the
/// create a single step, so two concurrent runs never share a file.
fn create_log() -> Result<File> {
    let mut index = 0usize;
    loop {
        let path = if index == 0 {
            PathBuf::from(LOG_BASENAME)
        } else {
            PathBuf::from(format!("alnprune.{index}.log"))
        };

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => return Ok(file),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => index += 1,
            Err(error) => return Err(error.into()),
        }
    }
}

/// Routes tracing output to a fresh log file. Keep the guard alive until exit so buffered lines
/// are flushed.
pub fn init_debug_tracing() -> Result<WorkerGuard> {
    let log_file = create_log()?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()?;

    Ok(guard)
}
