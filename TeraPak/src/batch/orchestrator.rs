//! Throttled parallel job execution
//!
//! A dispatcher thread hands jobs to a rayon pool, blocking on a counting
//! gate while `concurrency_cap` jobs are in flight. Each job runs behind
//! `catch_unwind`, so a failing or panicking job only marks its own status.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rayon::ThreadPool;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::progress::{AggregateProgress, JobState, JobStatus, ProgressSnapshot, ProgressStatus};

/// A unit of work run by the orchestrator
pub trait Job: Send + 'static {
    /// Name used in logs and reports
    fn name(&self) -> String;

    /// Number of sub-items; more than one marks a composite job
    fn sub_item_count(&self) -> usize {
        1
    }

    /// Do the work, reporting progress through `status`
    ///
    /// # Errors
    /// Any error marks this job as failed; other jobs are unaffected.
    fn run(&mut self, status: &JobStatus) -> Result<()>;
}

/// Job built from a closure
pub struct FnJob<F> {
    name: String,
    func: F,
}

impl<F> FnJob<F>
where
    F: FnMut(&JobStatus) -> Result<()> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Job for FnJob<F>
where
    F: FnMut(&JobStatus) -> Result<()> + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn run(&mut self, status: &JobStatus) -> Result<()> {
        (self.func)(status)
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Most jobs running at once
    pub concurrency_cap: usize,
    /// How often waiters poll job status
    pub poll_interval: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency_cap: 100,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            concurrency_cap: config.concurrency_cap,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    #[must_use]
    pub fn with_concurrency_cap(mut self, cap: usize) -> Self {
        self.concurrency_cap = cap;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Counting gate limiting jobs in flight
#[derive(Debug)]
struct Gate {
    running: Mutex<usize>,
    freed: Condvar,
    cap: usize,
    max_observed: AtomicUsize,
    poll_interval: Duration,
}

impl Gate {
    fn new(cap: usize, poll_interval: Duration) -> Self {
        Self {
            running: Mutex::new(0),
            freed: Condvar::new(),
            cap,
            max_observed: AtomicUsize::new(0),
            poll_interval,
        }
    }

    /// Block until a slot is free, then take it
    fn acquire(&self) {
        let mut running = self.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while *running >= self.cap {
            running = match self.freed.wait_timeout(running, self.poll_interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *running += 1;
        self.max_observed.fetch_max(*running, Ordering::SeqCst);
    }

    fn release(&self) {
        let mut running = self.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *running = running.saturating_sub(1);
        drop(running);
        self.freed.notify_one();
    }
}

/// Runs batches of jobs on a bounded worker pool
pub struct BatchOrchestrator {
    options: BatchOptions,
    pool: Arc<ThreadPool>,
}

impl BatchOrchestrator {
    /// Create an orchestrator with a pool of `concurrency_cap` threads.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for a zero cap or
    /// [`Error::ThreadPool`] if the pool cannot be built.
    pub fn new(options: BatchOptions) -> Result<Self> {
        if options.concurrency_cap == 0 {
            return Err(Error::InvalidConfig("concurrency cap must be at least 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.concurrency_cap)
            .thread_name(|i| format!("terapak-job-{i}"))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        Ok(Self {
            options,
            pool: Arc::new(pool),
        })
    }

    #[must_use]
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Start running `jobs` and return a handle to watch them.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the dispatcher thread cannot be spawned.
    pub fn submit(&self, jobs: Vec<Box<dyn Job>>) -> Result<AggregateHandle> {
        let statuses: Vec<Arc<JobStatus>> = jobs
            .iter()
            .map(|job| Arc::new(JobStatus::new(job.name(), job.sub_item_count())))
            .collect();
        let gate = Arc::new(Gate::new(self.options.concurrency_cap, self.options.poll_interval));
        let completed = Arc::new(AtomicUsize::new(0));

        info!(
            "Submitting {} jobs (cap {})",
            jobs.len(),
            self.options.concurrency_cap
        );

        let dispatcher = {
            let pool = Arc::clone(&self.pool);
            let gate = Arc::clone(&gate);
            let completed = Arc::clone(&completed);
            let statuses = statuses.clone();
            thread::Builder::new()
                .name("terapak-dispatch".to_string())
                .spawn(move || {
                    for (job, status) in jobs.into_iter().zip(statuses) {
                        gate.acquire();
                        let gate = Arc::clone(&gate);
                        let completed = Arc::clone(&completed);
                        pool.spawn(move || {
                            run_job(job, &status);
                            gate.release();
                            completed.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })?
        };

        Ok(AggregateHandle {
            statuses,
            gate,
            completed,
            started: Instant::now(),
            poll_interval: self.options.poll_interval,
            dispatcher: Some(dispatcher),
        })
    }
}

fn run_job(mut job: Box<dyn Job>, status: &JobStatus) {
    let name = status.name().to_string();
    status.mark_running();
    debug!("Job '{name}' started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(status)));
    match outcome {
        Ok(Ok(())) => {
            status.mark_completed();
            debug!("Job '{name}' finished in {:?}", status.elapsed());
        }
        Ok(Err(e)) => {
            error!("Job '{name}' failed: {e}");
            status.mark_failed(e.to_string());
        }
        Err(payload) => {
            let err = Error::JobPanicked {
                name: name.clone(),
                message: panic_message(payload.as_ref()),
            };
            error!("{err}");
            status.mark_failed(err.to_string());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Final outcome of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub name: String,
    pub state: JobState,
    pub elapsed_millis: u64,
    pub error: Option<String>,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
    pub completed: usize,
    pub failed: usize,
    pub total_elapsed_millis: u64,
    pub average_job_millis: u64,
    pub max_observed_concurrency: usize,
}

impl BatchReport {
    /// Serialize the report as pretty JSON
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Handle to a running batch
pub struct AggregateHandle {
    statuses: Vec<Arc<JobStatus>>,
    gate: Arc<Gate>,
    completed: Arc<AtomicUsize>,
    started: Instant,
    poll_interval: Duration,
    dispatcher: Option<JoinHandle<()>>,
}

impl AggregateHandle {
    /// Combined progress across all jobs
    #[must_use]
    pub fn progress(&self) -> AggregateProgress {
        AggregateProgress::from_snapshots(&self.statuses())
    }

    /// Snapshot of every job, in submission order
    #[must_use]
    pub fn statuses(&self) -> Vec<ProgressSnapshot> {
        self.statuses.iter().map(|s| s.snapshot()).collect()
    }

    /// Most jobs seen running at the same time so far
    #[must_use]
    pub fn max_observed_concurrency(&self) -> usize {
        self.gate.max_observed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completed.load(Ordering::SeqCst) == self.statuses.len()
    }

    /// Block until every job is finished
    pub fn wait(self) -> BatchReport {
        self.wait_with_progress(|_| {})
    }

    /// Block until every job is finished, calling `on_progress` each poll
    pub fn wait_with_progress<F>(mut self, mut on_progress: F) -> BatchReport
    where
        F: FnMut(&AggregateProgress),
    {
        loop {
            // Read the counter first so the last snapshot taken is complete
            let finished = self.is_finished();
            let progress = self.progress();
            on_progress(&progress);
            if finished {
                break;
            }
            thread::sleep(self.poll_interval);
        }

        if let Some(dispatcher) = self.dispatcher.take()
            && dispatcher.join().is_err()
        {
            warn!("Dispatcher thread panicked");
        }

        self.report()
    }

    fn report(&self) -> BatchReport {
        let total_elapsed = self.started.elapsed();
        let jobs: Vec<JobReport> = self
            .statuses()
            .into_iter()
            .map(|s| JobReport {
                name: s.name,
                state: s.state,
                elapsed_millis: s.elapsed_millis,
                error: s.error,
            })
            .collect();

        for job in &jobs {
            info!("  {}: {} ms ({:?})", job.name, job.elapsed_millis, job.state);
        }
        let average = if jobs.is_empty() {
            0
        } else {
            jobs.iter().map(|j| j.elapsed_millis).sum::<u64>() / jobs.len() as u64
        };
        let completed = jobs.iter().filter(|j| j.state == JobState::Completed).count();
        let failed = jobs.len() - completed;

        info!(
            "Batch finished: {completed} completed, {failed} failed, average worktime {average} ms, total {} ms",
            total_elapsed.as_millis()
        );

        BatchReport {
            jobs,
            completed,
            failed,
            total_elapsed_millis: total_elapsed.as_millis() as u64,
            average_job_millis: average,
            max_observed_concurrency: self.max_observed_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_cap_is_rejected() {
        assert!(matches!(
            BatchOrchestrator::new(BatchOptions::new().with_concurrency_cap(0)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_errors_and_panics_are_isolated() {
        let orchestrator = BatchOrchestrator::new(
            BatchOptions::new()
                .with_concurrency_cap(2)
                .with_poll_interval(Duration::from_millis(5)),
        )
        .unwrap();

        let jobs: Vec<Box<dyn Job>> = vec![
            Box::new(FnJob::new("ok", |status: &JobStatus| {
                status.set_total(1);
                status.advance(1);
                Ok(())
            })),
            Box::new(FnJob::new("err", |_: &JobStatus| Err(Error::NoPixelData))),
            Box::new(FnJob::new("panic", |_: &JobStatus| -> Result<()> { panic!("kaboom") })),
        ];

        let report = orchestrator.submit(jobs).unwrap().wait();
        let states: Vec<JobState> = report.jobs.iter().map(|j| j.state).collect();
        assert_eq!(
            states,
            vec![JobState::Completed, JobState::FailedIsolated, JobState::FailedIsolated]
        );
        assert!(report.jobs[2].error.as_deref().unwrap().contains("kaboom"));
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 2);
        assert!(report.max_observed_concurrency <= 2);
        assert!(report.to_json().unwrap().contains("\"FailedIsolated\""));
    }

    #[test]
    fn test_empty_batch() {
        let orchestrator = BatchOrchestrator::new(BatchOptions::new().with_concurrency_cap(1)).unwrap();
        let handle = orchestrator.submit(Vec::new()).unwrap();
        assert!(handle.is_finished());
        let report = handle.wait();
        assert_eq!(report.jobs.len(), 0);
        assert_eq!(report.average_job_millis, 0);
    }
}
