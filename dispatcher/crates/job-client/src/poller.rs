//! Client-side job status tracker.
//!
//! A [`StatusPoller`] repeatedly fetches `GET /jobs/recent`, keeps the merged
//! and sorted job list for display, and invokes a callback exactly once for
//! every job it sees reaching a terminal status after its first (baseline)
//! snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::JobsApi;
use crate::error::ApiError;
use crate::types::{JobSummary, JobWithResult, RecentJobsResponse};
use crate::view::{self, Page};

/// Shortest interval [`StatusPoller::start`] accepts; smaller values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub type TerminalCallback = Arc<dyn Fn(&JobSummary) + Send + Sync>;

/// Result of a single poll attempt.
#[derive(Debug)]
pub enum PollOutcome {
    /// First successful snapshot. Nothing fired.
    Baseline { jobs: usize },
    /// Snapshot applied; `fired` lists the jobs whose callback ran.
    Applied { jobs: usize, fired: Vec<Uuid> },
    /// Another fetch was already in flight.
    Skipped,
    /// The fetch was superseded by a newer one or the poller was stopped.
    Cancelled,
    Failed(ApiError),
}

#[derive(Default)]
struct PollerState {
    jobs: Vec<JobSummary>,
    credits_info: Option<Value>,
    seen_terminal: HashSet<Uuid>,
    baseline_taken: bool,
    error_count: u64,
    consecutive_errors: u64,
    last_error: Option<String>,
    last_error_retryable: bool,
    details: HashMap<Uuid, JobWithResult>,
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

struct Inner {
    api: Arc<dyn JobsApi>,
    on_terminal: TerminalCallback,
    state: Mutex<PollerState>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    // Held while a snapshot is applied and its callbacks run. `stop` takes it
    // once so nothing can be applied after it returns.
    dispatch: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight slot when a fetch ends, unless a newer fetch has
/// already replaced it.
struct FetchGuard<'a> {
    inner: &'a Inner,
    generation: u64,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(&self.inner.in_flight);
        if slot.as_ref().is_some_and(|f| f.generation == self.generation) {
            *slot = None;
        }
    }
}

impl Inner {
    fn begin_fetch(&self, supersede: bool) -> Option<(u64, CancellationToken)> {
        let mut slot = lock(&self.in_flight);
        if let Some(current) = slot.as_ref() {
            if !supersede {
                return None;
            }
            current.token.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.shutdown.child_token();
        *slot = Some(InFlight { generation, token: token.clone() });
        Some((generation, token))
    }

    async fn poll(&self, supersede: bool) -> PollOutcome {
        if self.shutdown.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        let Some((generation, token)) = self.begin_fetch(supersede) else {
            tracing::trace!("Poll skipped, a fetch is already in flight");
            return PollOutcome::Skipped;
        };
        let _guard = FetchGuard { inner: self, generation };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return PollOutcome::Cancelled,
            result = self.api.fetch_recent() => result,
        };

        match result {
            Ok(response) => self.apply(response, &token).await,
            Err(err) => {
                if token.is_cancelled() {
                    return PollOutcome::Cancelled;
                }
                let mut state = lock(&self.state);
                state.error_count += 1;
                state.consecutive_errors += 1;
                state.last_error = Some(err.user_message());
                state.last_error_retryable = err.is_retryable();
                if state.last_error_retryable {
                    tracing::warn!(
                        error = %err,
                        consecutive_errors = state.consecutive_errors,
                        "Failed to fetch recent jobs, will retry on next tick"
                    );
                } else {
                    tracing::error!(
                        error = %err,
                        consecutive_errors = state.consecutive_errors,
                        "Recent jobs request was refused, later polls are expected to fail the same way"
                    );
                }
                PollOutcome::Failed(err)
            }
        }
    }

    async fn apply(&self, response: RecentJobsResponse, token: &CancellationToken) -> PollOutcome {
        let _dispatch = self.dispatch.lock().await;
        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let jobs = view::merge_and_sort(response.active_jobs, response.recent_jobs);
        let mut to_fire = Vec::new();
        let baseline = {
            let mut state = lock(&self.state);
            let baseline = !state.baseline_taken;
            for job in jobs.iter().filter(|j| j.status.is_terminal()) {
                // Marked before the callback runs so a slow follow-up can never
                // let the next tick fire the same job again.
                if state.seen_terminal.insert(job.id) && !baseline {
                    to_fire.push(job.clone());
                }
            }
            state.baseline_taken = true;
            state.jobs = jobs;
            state.credits_info = response.credits_info;
            state.consecutive_errors = 0;
            state.last_error = None;
            state.last_error_retryable = false;
            baseline
        };

        let total = lock(&self.state).jobs.len();
        if baseline {
            tracing::debug!(jobs = total, "Baseline job snapshot taken");
            return PollOutcome::Baseline { jobs: total };
        }

        for job in &to_fire {
            tracing::info!(job_id = %job.id, status = %job.status, "Job reached terminal status");
            (self.on_terminal)(job);
        }
        PollOutcome::Applied { jobs: total, fired: to_fire.into_iter().map(|j| j.id).collect() }
    }
}

/// Tracks the job list of one dispatcher and reports terminal transitions.
///
/// Each poller owns its seen-terminal set, so independent pollers never
/// affect each other.
pub struct StatusPoller {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusPoller {
    pub fn new<F>(api: Arc<dyn JobsApi>, on_terminal: F) -> Self
    where
        F: Fn(&JobSummary) + Send + Sync + 'static,
    {
        let inner = Inner {
            api,
            on_terminal: Arc::new(on_terminal),
            state: Mutex::new(PollerState::default()),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            dispatch: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        };
        Self { inner: Arc::new(inner), task: Mutex::new(None) }
    }

    /// Starts polling every `interval`, beginning immediately.
    ///
    /// Ticks that fire while a fetch is running are dropped, not queued.
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it. Calling `start`
    /// on a running or stopped poller does nothing.
    pub fn start(&self, interval: Duration) {
        let mut task = lock(&self.task);
        if task.is_some() || self.inner.shutdown.is_cancelled() {
            tracing::warn!("Status poller already started or stopped, ignoring start");
            return;
        }

        if interval < MIN_POLL_INTERVAL {
            tracing::warn!(?interval, min = ?MIN_POLL_INTERVAL, "Poll interval too short, using the minimum");
        }
        let interval = interval.max(MIN_POLL_INTERVAL);

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = inner.poll(false).await;
                        tracing::trace!(?outcome, "Poll tick finished");
                    }
                }
            }
            tracing::debug!("Status poller loop exited");
        }));
    }

    /// Runs one fetch now, unless one is already in flight.
    pub async fn poll_once(&self) -> PollOutcome {
        self.inner.poll(false).await
    }

    /// Runs one fetch now, cancelling any fetch still in flight so its
    /// response is discarded.
    pub async fn refresh(&self) -> PollOutcome {
        self.inner.poll(true).await
    }

    /// Stops polling and cancels the outstanding request. Once this returns the
    /// poller's state no longer changes and no callback fires.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Status poller task ended abnormally");
            }
        }
        let _barrier = self.inner.dispatch.lock().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Merged list from the latest snapshot, active jobs first.
    pub fn jobs(&self) -> Vec<JobSummary> {
        lock(&self.inner.state).jobs.clone()
    }

    /// Page of the latest snapshot. Does not fetch.
    pub fn page(&self, page: usize, page_size: usize) -> Page {
        view::paginate(&lock(&self.inner.state).jobs, page, page_size)
    }

    pub fn credits_info(&self) -> Option<Value> {
        lock(&self.inner.state).credits_info.clone()
    }

    /// Failed fetches since the poller was created.
    pub fn error_count(&self) -> u64 {
        lock(&self.inner.state).error_count
    }

    pub fn consecutive_errors(&self) -> u64 {
        lock(&self.inner.state).consecutive_errors
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.state).last_error.clone()
    }

    /// Whether the most recent failed fetch is one a later attempt may
    /// recover from. `None` when the last fetch succeeded.
    pub fn last_error_is_retryable(&self) -> Option<bool> {
        let state = lock(&self.inner.state);
        state.last_error.as_ref().map(|_| state.last_error_retryable)
    }

    pub fn has_baseline(&self) -> bool {
        lock(&self.inner.state).baseline_taken
    }

    /// Full job including payloads. Fetched on demand; terminal jobs are cached
    /// since their details can no longer change.
    pub async fn details(&self, id: Uuid) -> Result<JobWithResult, ApiError> {
        let cached = lock(&self.inner.state).details.get(&id).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let job = tokio::select! {
            biased;
            _ = self.inner.shutdown.cancelled() => return Err(ApiError::Cancelled),
            result = self.inner.api.fetch_details(id) => result?,
        };

        if job.summary.status.is_terminal() {
            lock(&self.inner.state).details.insert(id, job.clone());
        }
        Ok(job)
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
