use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub reason: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn with_reason(state: JobState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// Rows of a finished job, header excluded. Cells are text or null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query engine error: {0}")]
pub struct EngineError(pub String);

/// An asynchronous SQL job service.
pub trait QueryEngine {
    /// Starts a job and returns its id without waiting for it.
    fn submit(
        &self,
        sql: &str,
        database: &str,
        result_location: &str,
    ) -> Result<String, EngineError>;

    fn poll(&self, job_id: &str) -> Result<JobStatus, EngineError>;

    fn fetch_results(&self, job_id: &str) -> Result<ResultSet, EngineError>;
}

impl<T: QueryEngine + ?Sized> QueryEngine for &T {
    fn submit(
        &self,
        sql: &str,
        database: &str,
        result_location: &str,
    ) -> Result<String, EngineError> {
        (**self).submit(sql, database, result_location)
    }

    fn poll(&self, job_id: &str) -> Result<JobStatus, EngineError> {
        (**self).poll(job_id)
    }

    fn fetch_results(&self, job_id: &str) -> Result<ResultSet, EngineError> {
        (**self).fetch_results(job_id)
    }
}

impl<T: QueryEngine + ?Sized> QueryEngine for Arc<T> {
    fn submit(
        &self,
        sql: &str,
        database: &str,
        result_location: &str,
    ) -> Result<String, EngineError> {
        (**self).submit(sql, database, result_location)
    }

    fn poll(&self, job_id: &str) -> Result<JobStatus, EngineError> {
        (**self).poll(job_id)
    }

    fn fetch_results(&self, job_id: &str) -> Result<ResultSet, EngineError> {
        (**self).fetch_results(job_id)
    }
}
