//! Job progress: writer handle and bounded poll stream
//!
//! The export job writes through a [`ProgressReporter`]; every update is sent
//! over an unbounded channel to a forwarding task that persists the latest
//! value, so the job never waits on the store (or on anyone reading it).
//! Pollers read the store on a fixed interval and always terminate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use listgen_common::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{JobState, ProgressState};

/// Process-external, pollable record of job progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Create (or reset) the record at 0/0 "Initializing..."
    async fn init(&self, job_id: Uuid) -> Result<()>;

    /// Record progress; `current` never moves backwards
    async fn update(&self, job_id: Uuid, current: u64, total: u64, status: &str) -> Result<()>;

    /// Move the record to a terminal state
    async fn finish(&self, job_id: Uuid, state: JobState, status: &str) -> Result<()>;

    async fn read(&self, job_id: Uuid) -> Result<Option<ProgressState>>;

    /// Delete finished records last touched before `older_than`
    async fn expire(&self, older_than: DateTime<Utc>) -> Result<u64>;

    /// Fail every record still marked running (left behind by a previous process)
    async fn abandon_running(&self) -> Result<u64>;
}

enum ProgressEvent {
    Update {
        current: u64,
        total: u64,
        status: String,
    },
    Finish {
        state: JobState,
        status: String,
    },
}

/// Cheap clonable writer handle, usable from async and blocking code
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: Uuid,
    current: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

/// Forwarding task behind a [`ProgressReporter`]
pub struct ProgressForwarder {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Initialize the job's record and start the forwarding task
    pub async fn start(
        store: Arc<dyn ProgressStore>,
        job_id: Uuid,
    ) -> (ProgressReporter, ProgressForwarder) {
        if let Err(e) = store.init(job_id).await {
            warn!(job_id = %job_id, error = %e, "Failed to initialize progress record");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(forward(store, job_id, rx));

        let reporter = ProgressReporter {
            job_id,
            current: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(0)),
            tx,
        };
        (reporter, ProgressForwarder { handle })
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Set the unit count for the job
    pub fn set_total(&self, total: u64, status: impl Into<String>) {
        self.total.store(total, Ordering::SeqCst);
        self.send_update(status.into());
    }

    /// Change the status text without moving the counters
    pub fn status(&self, status: impl Into<String>) {
        self.send_update(status.into());
    }

    /// One unit of work done
    pub fn tick(&self, status: impl Into<String>) {
        self.current.fetch_add(1, Ordering::SeqCst);
        self.send_update(status.into());
    }

    /// Jump forward to `current`; lower values are ignored
    pub fn advance_to(&self, current: u64, status: impl Into<String>) {
        self.current.fetch_max(current, Ordering::SeqCst);
        self.send_update(status.into());
    }

    /// Final state; the forwarding task stops after persisting it
    pub fn finish(&self, state: JobState, status: impl Into<String>) {
        let _ = self.tx.send(ProgressEvent::Finish {
            state,
            status: status.into(),
        });
    }

    fn send_update(&self, status: String) {
        let event = ProgressEvent::Update {
            current: self.current(),
            total: self.total(),
            status,
        };
        // Receiver gone means the job already finished
        let _ = self.tx.send(event);
    }
}

impl ProgressForwarder {
    /// Wait until every queued update (and the final state) is persisted
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Progress forwarding task failed");
        }
    }
}

async fn forward(
    store: Arc<dyn ProgressStore>,
    job_id: Uuid,
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
) {
    while let Some(event) = rx.recv().await {
        // Coalesce a backlog of updates into the newest one, stopping at a finish
        let mut pending = None;
        let mut finish = None;
        let mut next = Some(event);
        while let Some(event) = next.take() {
            match event {
                ProgressEvent::Update { .. } => {
                    pending = Some(event);
                    next = rx.try_recv().ok();
                }
                ProgressEvent::Finish { .. } => finish = Some(event),
            }
        }

        // Counters travel only in updates; persist them before the final state
        if let Some(ProgressEvent::Update {
            current,
            total,
            status,
        }) = pending
        {
            if let Err(e) = store.update(job_id, current, total, &status).await {
                warn!(job_id = %job_id, error = %e, "Progress update not persisted");
            }
        }

        if let Some(ProgressEvent::Finish { state, status }) = finish {
            if let Err(e) = store.finish(job_id, state, &status).await {
                warn!(job_id = %job_id, error = %e, "Final progress state not persisted");
            }
            break;
        }
    }
    debug!(job_id = %job_id, "Progress forwarding stopped");
}

/// Status text emitted when a poll stream gives up
pub const POLL_TIMEOUT_STATUS: &str = "Progress polling timed out";

/// Status text emitted when the job never appears in the store
pub const JOB_NOT_FOUND_STATUS: &str = "Job not found";

/// Bounded reader over a [`ProgressStore`]
#[derive(Clone)]
pub struct ProgressPoller {
    store: Arc<dyn ProgressStore>,
    poll_interval: Duration,
    max_polls: u32,
    missing_grace_polls: u32,
}

impl ProgressPoller {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        poll_interval: Duration,
        max_polls: u32,
        missing_grace_polls: u32,
    ) -> Self {
        Self {
            store,
            poll_interval,
            max_polls: max_polls.max(1),
            missing_grace_polls,
        }
    }

    /// Stream of progress snapshots for one job
    ///
    /// Yields whenever the snapshot changes. Ends on a terminal state. Once the
    /// counters are complete the stream waits at most `missing_grace_polls`
    /// more reads for the terminal state before ending. Also ends when the
    /// job is still unknown after that grace period, or after `max_polls`
    /// reads, in which case a final snapshot carrying [`POLL_TIMEOUT_STATUS`]
    /// is emitted.
    pub fn stream(&self, job_id: Uuid) -> impl Stream<Item = ProgressState> + Send + 'static {
        let store = self.store.clone();
        let poll_interval = self.poll_interval;
        let max_polls = self.max_polls;
        let missing_grace_polls = self.missing_grace_polls;

        async_stream::stream! {
            let mut last: Option<ProgressState> = None;
            let mut missing = 0u32;
            // Polls spent waiting for a terminal state after the counters completed
            let mut settling = 0u32;

            for poll in 0..max_polls {
                if poll > 0 {
                    tokio::time::sleep(poll_interval).await;
                }

                match store.read(job_id).await {
                    Ok(Some(state)) => {
                        missing = 0;
                        let changed = last.as_ref().map_or(true, |prev| {
                            prev.current != state.current
                                || prev.total != state.total
                                || prev.status != state.status
                                || prev.state != state.state
                        });
                        let terminal = state.state.is_terminal();
                        let done = state.is_done();
                        if changed {
                            yield state.clone();
                        }
                        last = Some(state);
                        if terminal {
                            return;
                        }
                        if done {
                            // Packaging can still fail after the last row tick
                            settling += 1;
                            if settling > missing_grace_polls {
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        missing += 1;
                        if missing > missing_grace_polls {
                            let mut gone = last.clone().unwrap_or_else(|| ProgressState::initial(job_id));
                            gone.status = JOB_NOT_FOUND_STATUS.to_string();
                            gone.state = JobState::Failed;
                            gone.updated_at = Utc::now();
                            yield gone;
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "Progress read failed");
                    }
                }
            }

            let mut timed_out = last.unwrap_or_else(|| ProgressState::initial(job_id));
            timed_out.status = POLL_TIMEOUT_STATUS.to_string();
            timed_out.updated_at = Utc::now();
            yield timed_out;
        }
    }
}
