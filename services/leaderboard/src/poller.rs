use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::engine::{EngineError, JobState, JobStatus, QueryEngine, ResultSet};

const UNKNOWN_REASON: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("query {state}: {reason}")]
    QueryFailed { state: JobState, reason: String },
    #[error("query {job_id} did not complete within {}s", .timeout.as_secs_f64())]
    QueryTimeout { job_id: String, timeout: Duration },
}

/// Drives one job from submission to a terminal state. A timeout only stops
/// local waiting; the remote job is left running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPoller {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl QueryPoller {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Submits `sql`, waits for success and returns the rows.
    pub fn run<E: QueryEngine + ?Sized>(
        &self,
        engine: &E,
        sql: &str,
        database: &str,
        result_location: &str,
    ) -> Result<ResultSet, PollError> {
        let job_id = engine.submit(sql, database, result_location)?;
        info!(job_id = %job_id, "query submitted");
        self.wait(engine, &job_id)?;
        Ok(engine.fetch_results(&job_id)?)
    }

    pub fn wait<E: QueryEngine + ?Sized>(
        &self,
        engine: &E,
        job_id: &str,
    ) -> Result<JobStatus, PollError> {
        let started = Instant::now();
        loop {
            let status = engine.poll(job_id)?;
            debug!(job_id, state = %status.state, "query polled");
            match status.state {
                JobState::Succeeded => return Ok(status),
                JobState::Failed | JobState::Cancelled => {
                    return Err(PollError::QueryFailed {
                        state: status.state,
                        reason: status
                            .reason
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| UNKNOWN_REASON.to_string()),
                    });
                }
                JobState::Queued | JobState::Running => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(PollError::QueryTimeout {
                    job_id: job_id.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(self.poll_interval.min(self.timeout - elapsed));
        }
    }
}
