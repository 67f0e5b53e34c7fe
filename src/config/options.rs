use std::path::PathBuf;
use std::time::Duration;

/// Default location of the persisted job history.
pub const DEFAULT_HISTORY_PATH: &str = "alnprune_history.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Time between job status checks
    pub poll_interval: Duration,
    /// Give up polling after this long
    pub poll_timeout: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Job history file
    pub history_path: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
        }
    }
}
