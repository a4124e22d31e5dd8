//! Progress reporting for long-running jobs
//!
//! Each job owns a [`JobStatus`] it updates from its worker thread; any other
//! thread may take a [`ProgressSnapshot`] at any time.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    /// Failed or panicked without affecting other jobs
    FailedIsolated,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::FailedIsolated)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::FailedIsolated => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::FailedIsolated,
            _ => Self::Pending,
        }
    }
}

/// Point-in-time view of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub name: String,
    pub state: JobState,
    pub progress_count: usize,
    pub total_count: usize,
    pub is_finished: bool,
    /// More than one marks a composite job weighted by sub-items
    pub sub_item_count: usize,
    pub sub_items_done: usize,
    pub elapsed_millis: u64,
    pub error: Option<String>,
}

impl ProgressSnapshot {
    /// Completion of this job from 0.0 to 1.0
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.is_finished {
            return 1.0;
        }
        let (done, total) = if self.sub_item_count > 1 {
            (self.sub_items_done, self.sub_item_count)
        } else {
            (self.progress_count, self.total_count)
        };
        if total == 0 {
            0.0
        } else {
            (done as f64 / total as f64).min(1.0)
        }
    }
}

/// Anything that can report its progress
pub trait ProgressStatus: Send + Sync {
    fn snapshot(&self) -> ProgressSnapshot;
}

/// Live, thread-safe status of one job
#[derive(Debug)]
pub struct JobStatus {
    name: String,
    state: AtomicU8,
    progress_count: AtomicUsize,
    total_count: AtomicUsize,
    sub_item_count: usize,
    sub_items_done: AtomicUsize,
    finished: AtomicBool,
    started: Mutex<Option<Instant>>,
    elapsed: Mutex<Option<Duration>>,
    error: Mutex<Option<String>>,
}

impl JobStatus {
    #[must_use]
    pub fn new(name: impl Into<String>, sub_item_count: usize) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(JobState::Pending.to_u8()),
            progress_count: AtomicUsize::new(0),
            total_count: AtomicUsize::new(0),
            sub_item_count,
            sub_items_done: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            started: Mutex::new(None),
            elapsed: Mutex::new(None),
            error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Set the number of work items this job will report
    pub fn set_total(&self, total: usize) {
        self.total_count.store(total, Ordering::SeqCst);
    }

    /// Mark `count` more work items done
    pub fn advance(&self, count: usize) {
        self.progress_count.fetch_add(count, Ordering::SeqCst);
    }

    /// Mark one composite sub-item done
    pub fn sub_item_done(&self) {
        self.sub_items_done.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_running(&self) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.state.store(JobState::Running.to_u8(), Ordering::SeqCst);
    }

    pub(crate) fn mark_completed(&self) {
        self.finish(JobState::Completed, None);
    }

    pub(crate) fn mark_failed(&self, error: String) {
        self.finish(JobState::FailedIsolated, Some(error));
    }

    fn finish(&self, state: JobState, error: Option<String>) {
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|started| started.map(|s| s.elapsed()));
        if let Ok(mut slot) = self.elapsed.lock() {
            *slot = elapsed;
        }
        if let Ok(mut slot) = self.error.lock() {
            *slot = error;
        }
        self.state.store(state.to_u8(), Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Wall time so far, or the final time once finished
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        if let Some(done) = self.elapsed.lock().ok().and_then(|e| *e) {
            return done;
        }
        self.started
            .lock()
            .ok()
            .and_then(|s| s.map(|s| s.elapsed()))
            .unwrap_or_default()
    }
}

impl ProgressStatus for JobStatus {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            name: self.name.clone(),
            state: self.state(),
            progress_count: self.progress_count.load(Ordering::SeqCst),
            total_count: self.total_count.load(Ordering::SeqCst),
            is_finished: self.is_finished(),
            sub_item_count: self.sub_item_count,
            sub_items_done: self.sub_items_done.load(Ordering::SeqCst),
            elapsed_millis: self.elapsed().as_millis() as u64,
            error: self.error.lock().ok().and_then(|e| e.clone()),
        }
    }
}

/// Combined progress of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateProgress {
    /// Sum of per-job completion fractions
    pub done: f64,
    pub finished: usize,
    pub failed: usize,
    pub total: usize,
}

impl AggregateProgress {
    /// Combine job snapshots; composite jobs count by sub-item completion
    #[must_use]
    pub fn from_snapshots(snapshots: &[ProgressSnapshot]) -> Self {
        Self {
            done: snapshots.iter().map(ProgressSnapshot::fraction).sum(),
            finished: snapshots.iter().filter(|s| s.is_finished).count(),
            failed: snapshots
                .iter()
                .filter(|s| s.state == JobState::FailedIsolated)
                .count(),
            total: snapshots.len(),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.done / self.total as f64) as f32
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished == self.total
    }
}

impl fmt::Display for AggregateProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Finished {}/{} ({:.1}%)",
            self.finished,
            self.total,
            f64::from(self.percentage()) * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle() {
        let status = JobStatus::new("Rock.gpk", 1);
        assert_eq!(status.state(), JobState::Pending);

        status.mark_running();
        status.set_total(4);
        status.advance(1);
        let snap = status.snapshot();
        assert_eq!(snap.state, JobState::Running);
        assert!((snap.fraction() - 0.25).abs() < f64::EPSILON);

        status.mark_failed("boom".to_string());
        let snap = status.snapshot();
        assert_eq!(snap.state, JobState::FailedIsolated);
        assert!(snap.is_finished);
        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert!((snap.fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_composite_weighting() {
        let composite = JobStatus::new("Zone.gmp", 4);
        composite.mark_running();
        composite.set_total(1000);
        composite.advance(999);
        composite.sub_item_done();
        // Sub-items win over the plain counters
        assert!((composite.snapshot().fraction() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate() {
        let a = JobStatus::new("a", 1);
        a.mark_running();
        a.mark_completed();
        let b = JobStatus::new("b", 1);
        b.mark_running();
        b.set_total(2);
        b.advance(1);
        let c = JobStatus::new("c", 1);

        let agg = AggregateProgress::from_snapshots(&[a.snapshot(), b.snapshot(), c.snapshot()]);
        assert_eq!(agg.finished, 1);
        assert_eq!(agg.total, 3);
        assert!((agg.percentage() - 0.5).abs() < 1e-6);
        assert_eq!(agg.to_string(), "Finished 1/3 (50.0%)");
        assert!(!agg.is_complete());
    }
}
