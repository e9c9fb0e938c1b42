//! A single asynchronous operation with an append-only log.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

/// Observers append nothing and read by offset; the owning worker is the
/// only writer.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    output: Vec<String>,
}

/// An async operation: migration preview, migration run, connection check.
///
/// Status transitions are monotonic; the first terminal transition wins.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub job_type: String,
    pub connection_id: String,
    pub started_at: DateTime<Utc>,
    state: Mutex<JobState>,
    cancel: CancellationToken,
}

impl Job {
    pub(crate) fn new(job_type: &str, connection_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type: job_type.to_string(),
            connection_id: connection_id.to_string(),
            started_at: Utc::now(),
            state: Mutex::new(JobState {
                status: JobStatus::Running,
                finished_at: None,
                error: None,
                output: Vec::new(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Appends a log line. Safe under concurrent callers.
    pub fn append_log(&self, line: &str) {
        self.state.lock().unwrap().output.push(line.to_string());
    }

    /// Log lines starting from the given offset.
    pub fn logs_since(&self, offset: usize) -> Vec<String> {
        let state = self.state.lock().unwrap();
        if offset >= state.output.len() {
            return Vec::new();
        }
        state.output[offset..].to_vec()
    }

    pub fn log_len(&self) -> usize {
        self.state.lock().unwrap().output.len()
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().unwrap().status
    }

    fn finish(&self, status: JobStatus, error: Option<String>) {
        let mut state = self.state.lock().unwrap();
        if state.status.is_terminal() {
            return;
        }
        state.status = status;
        state.error = error;
        state.finished_at = Some(Utc::now());
    }

    /// Marks the job completed. Idempotent; a prior terminal state wins.
    pub fn complete(&self) {
        self.finish(JobStatus::Completed, None);
    }

    /// Marks the job failed. Idempotent; a prior terminal state wins.
    pub fn fail(&self, err: &str) {
        self.finish(JobStatus::Failed, Some(err.to_string()));
    }

    /// Marks the job cancelled, once the worker has observed the signal.
    pub fn mark_cancelled(&self) {
        self.finish(JobStatus::Cancelled, None);
    }

    /// Requests cancellation. The running work observes the token at its
    /// suspension points; the status flips when it does.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A log sink appending to this job's buffer.
    pub fn log_sink(self: &Arc<Self>) -> LogSink {
        let job = Arc::clone(self);
        Arc::new(move |line: &str| job.append_log(line))
    }

    /// Serializable view of the current job state.
    pub fn snapshot(&self) -> JobView {
        let state = self.state.lock().unwrap();
        JobView {
            id: self.id.clone(),
            job_type: self.job_type.clone(),
            connection_id: self.connection_id.clone(),
            status: state.status,
            started_at: self.started_at,
            finished_at: state.finished_at,
            error: state.error.clone(),
            output: state.output.clone(),
        }
    }
}

/// Snapshot of a job, as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobView {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub connection_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_since_offsets() {
        let job = Job::new("migration-preview", "conn-1");
        job.append_log("one");
        job.append_log("two");
        job.append_log("three");

        assert_eq!(job.logs_since(0), vec!["one", "two", "three"]);
        assert_eq!(job.logs_since(2), vec!["three"]);
        assert!(job.logs_since(3).is_empty());
        assert!(job.logs_since(99).is_empty());
    }

    #[test]
    fn test_first_terminal_transition_wins() {
        let job = Job::new("migration-run", "conn-1");
        job.complete();
        job.fail("late failure");
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.snapshot().error.is_none());

        let job = Job::new("migration-run", "conn-1");
        job.fail("boom");
        job.complete();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.snapshot().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_cancel_sets_flag_not_status() {
        let job = Job::new("migration-run", "conn-1");
        job.cancel();
        assert!(job.is_cancel_requested());
        assert_eq!(job.status(), JobStatus::Running);

        job.mark_cancelled();
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(job.snapshot().finished_at.is_some());
    }

    #[test]
    fn test_concurrent_append() {
        use std::thread;

        let job = Arc::new(Job::new("migration-run", "conn-1"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let job = job.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        job.append_log(&format!("worker {i} line {j}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(job.log_len(), 800);
    }

    #[test]
    fn test_log_sink_appends() {
        let job = Arc::new(Job::new("migration-preview", "conn-1"));
        let sink = job.log_sink();
        sink("hello");
        assert_eq!(job.logs_since(0), vec!["hello"]);
    }
}
