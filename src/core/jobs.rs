use crate::api::JobStatusSource;
use crate::core::poll::{JobPoller, PollCommand, PollEvent, PollState};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delivers interval ticks to the poll driver.
pub trait Ticker {
    /// Waits for the next tick and returns the time elapsed since the ticker was created.
    fn tick(&mut self) -> impl Future<Output = Duration> + Send;
}

/// Fixed-interval ticker backed by `tokio::time::interval`.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: tokio::time::Interval,
    started: Instant,
}

impl IntervalTicker {
    /// The first tick fires one `period` after creation.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let started = Instant::now();
        let mut interval = tokio::time::interval_at(started + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, started }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Duration {
        self.interval.tick().await.duration_since(self.started)
    }
}

/// Polls `job_id` until the poller reaches a terminal state.
///
/// Status is fetched once immediately and then on every tick. Cancelling `cancel` ends the poll
/// with `PollState::Cancelled`, including while a status request is in flight.
pub async fn poll_job<S, T>(
    source: &S,
    job_id: &str,
    ticker: &mut T,
    timeout: Duration,
    cancel: &CancellationToken,
) -> PollState
where
    S: JobStatusSource,
    T: Ticker,
{
    info!(job_id, timeout = ?timeout, "started polling job");
    let mut poller = JobPoller::new(timeout);
    let mut command = poller.handle(PollEvent::Start);

    while !poller.state().is_terminal() {
        let event = match command.take() {
            Some(PollCommand::FetchStatus) => tokio::select! {
                biased;
                () = cancel.cancelled() => PollEvent::Cancel,
                result = source.status(job_id) => match result {
                    Ok(status) => PollEvent::Status(status),
                    Err(error) => PollEvent::FetchFailed(error),
                },
            },
            None => tokio::select! {
                biased;
                () = cancel.cancelled() => PollEvent::Cancel,
                elapsed = ticker.tick() => PollEvent::Tick { elapsed },
            },
        };

        command = poller.handle(event);
    }

    let state = poller.state().clone();
    info!(job_id, state = %state, "finished polling job");
    state
}

/// Spawns a task polling `job_id` with a fixed interval.
///
/// On completion, sends the terminal `PollState` over `state_tx`.
pub fn spawn_poll_job<S>(
    source: S,
    job_id: String,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
    state_tx: mpsc::Sender<PollState>,
) -> JoinHandle<()>
where
    S: JobStatusSource + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = IntervalTicker::new(interval);
        let state = poll_job(&source, &job_id, &mut ticker, timeout, &cancel).await;

        if let Err(send_error) = state_tx.send(state).await {
            warn!(
                error = ?send_error,
                "failed to send poll result"
            );
        } else {
            debug!(job_id = %job_id, "sent poll result");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FetchError, JobStatus};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed list of responses, then reports `Running` forever.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<JobStatus, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<JobStatus, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl JobStatusSource for ScriptedSource {
        async fn status(&self, _job_id: &str) -> Result<JobStatus, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(JobStatus::Running))
        }
    }

    /// Advances a fake clock by a fixed step on every tick.
    struct StepTicker {
        step: Duration,
        now: Duration,
    }

    impl Ticker for StepTicker {
        async fn tick(&mut self) -> Duration {
            self.now += self.step;
            self.now
        }
    }

    fn ticker() -> StepTicker {
        StepTicker {
            step: Duration::from_secs(5),
            now: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_poll_until_completed() {
        let source = ScriptedSource::new(vec![
            Ok(JobStatus::Pending),
            Err(FetchError::Server { status: 503 }),
            Ok(JobStatus::Running),
            Ok(JobStatus::Completed),
        ]);
        let state = poll_job(
            &source,
            "job",
            &mut ticker(),
            Duration::from_secs(3600),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(state, PollState::Succeeded);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let source = ScriptedSource::new(Vec::new());
        let state = poll_job(
            &source,
            "job",
            &mut ticker(),
            Duration::from_secs(20),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(
            state,
            PollState::TimedOut {
                elapsed: Duration::from_secs(20)
            }
        );
        // initial check plus ticks at 5, 10 and 15 seconds
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_stops_on_client_error() {
        let source = ScriptedSource::new(vec![Err(FetchError::Client { status: 404 })]);
        let state = poll_job(
            &source,
            "job",
            &mut ticker(),
            Duration::from_secs(3600),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(state, PollState::Failed { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_cancelled_before_start() {
        let source = ScriptedSource::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = poll_job(
            &source,
            "job",
            &mut ticker(),
            Duration::from_secs(3600),
            &cancel,
        )
        .await;

        assert_eq!(state, PollState::Cancelled);
    }

    #[tokio::test]
    async fn test_spawned_poll_reports_state() {
        let source = ScriptedSource::new(vec![Ok(JobStatus::Running), Ok(JobStatus::Completed)]);
        let (state_tx, mut state_rx) = mpsc::channel(1);
        let handle = spawn_poll_job(
            source,
            "job".to_string(),
            Duration::from_millis(10),
            Duration::from_secs(60),
            CancellationToken::new(),
            state_tx,
        );

        assert_eq!(state_rx.recv().await, Some(PollState::Succeeded));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_spawned_poll_can_be_cancelled() {
        let source = ScriptedSource::new(Vec::new());
        let cancel = CancellationToken::new();
        let (state_tx, mut state_rx) = mpsc::channel(1);
        spawn_poll_job(
            source,
            "job".to_string(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
            cancel.clone(),
            state_tx,
        );

        tokio::time::sleep(Duration::from_millis(25)).await;
        cancel.cancel();
        assert_eq!(state_rx.recv().await, Some(PollState::Cancelled));
    }
}
