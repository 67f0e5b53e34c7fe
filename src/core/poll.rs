use crate::api::{FetchError, JobStatus};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Where a job poll currently stands.
///
/// `Succeeded`, `Failed`, `TimedOut` and `Cancelled` are terminal: once reached, every further
/// event is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Polling {
        elapsed: Duration,
        attempts: u32,
    },
    Succeeded,
    Failed {
        reason: String,
    },
    TimedOut {
        elapsed: Duration,
    },
    Cancelled,
}

impl PollState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Idle | PollState::Polling { .. })
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Idle => write!(f, "Status: Idle"),
            PollState::Polling { attempts, .. } => write!(f, "Status: Polling ({attempts} checks)"),
            PollState::Succeeded => write!(f, "Status: Succeeded"),
            PollState::Failed { reason } => write!(f, "Status: Failed ({reason})"),
            PollState::TimedOut { elapsed } => {
                write!(f, "Status: Timed out after {}s", elapsed.as_secs())
            }
            PollState::Cancelled => write!(f, "Status: Cancelled"),
        }
    }
}

/// Discrete inputs to the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Start,
    /// An interval tick, carrying the time since `Start`.
    Tick { elapsed: Duration },
    Status(JobStatus),
    FetchFailed(FetchError),
    Cancel,
}

/// What the driver should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    FetchStatus,
}

/// Polling state machine for one job.
///
/// Holds no timers itself: the caller delivers ticks and responses as [`PollEvent`]s, which keeps
/// timeout and cancellation independent of any clock.
#[derive(Debug, Clone)]
pub struct JobPoller {
    state: PollState,
    timeout: Duration,
}

impl JobPoller {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: PollState::Idle,
            timeout,
        }
    }

    #[must_use]
    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Applies an event and returns the command the driver should carry out, if any.
    pub fn handle(&mut self, event: PollEvent) -> Option<PollCommand> {
        if self.state.is_terminal() {
            trace!(state = ?self.state, event = ?event, "ignoring event in terminal state");
            return None;
        }

        let (next, command) = match (std::mem::take(&mut self.state), event) {
            (_, PollEvent::Cancel) => {
                debug!("poll cancelled");
                (PollState::Cancelled, None)
            }
            (PollState::Idle, PollEvent::Start) => (
                PollState::Polling {
                    elapsed: Duration::ZERO,
                    attempts: 1,
                },
                Some(PollCommand::FetchStatus),
            ),
            (PollState::Polling { attempts, .. }, PollEvent::Tick { elapsed }) => {
                if elapsed >= self.timeout {
                    debug!(elapsed = ?elapsed, timeout = ?self.timeout, "poll timed out");
                    (PollState::TimedOut { elapsed }, None)
                } else {
                    (
                        PollState::Polling {
                            elapsed,
                            attempts: attempts + 1,
                        },
                        Some(PollCommand::FetchStatus),
                    )
                }
            }
            (polling @ PollState::Polling { .. }, PollEvent::Status(status)) => {
                trace!(status = %status, "received job status");
                let next = match status {
                    JobStatus::Completed => PollState::Succeeded,
                    JobStatus::Failed { message } => PollState::Failed {
                        reason: message.unwrap_or_else(|| "job failed".to_string()),
                    },
                    JobStatus::Pending | JobStatus::Running | JobStatus::Unknown(_) => polling,
                };
                (next, None)
            }
            (polling @ PollState::Polling { .. }, PollEvent::FetchFailed(error)) => {
                if error.is_retryable() {
                    warn!(error = %error, "status check failed, retrying on next tick");
                    (polling, None)
                } else {
                    warn!(error = %error, "status check failed permanently");
                    let reason = error.to_string();
                    (PollState::Failed { reason }, None)
                }
            }
            (state, event) => {
                trace!(state = ?state, event = ?event, "ignoring poll event");
                (state, None)
            }
        };

        self.state = next;
        command
    }
}
