pub mod config;
pub mod engine;
pub mod gateway;
pub mod metrics;
pub mod params;
pub mod poller;
pub mod results;
pub mod routes;
pub mod service;
pub mod sql;

use thiserror::Error;

pub use config::LeaderboardConfig;
pub use engine::{EngineError, JobState, JobStatus, QueryEngine, ResultSet};
pub use poller::{PollError, QueryPoller};
pub use service::{LeaderboardPayload, LeaderboardService};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaderboardError {
    /// Caller-supplied parameter failed validation. The message is returned
    /// to the caller verbatim.
    #[error("{0}")]
    InvalidParameter(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Poll(#[from] PollError),
    /// The query engine returned a value that cannot be used in a follow-up
    /// query.
    #[error("unexpected query result: {0}")]
    UnexpectedResult(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("response encoding failed: {0}")]
    Encode(String),
}

impl From<EngineError> for LeaderboardError {
    fn from(value: EngineError) -> Self {
        Self::Poll(PollError::Engine(value))
    }
}

impl LeaderboardError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidParameter(_) => 400,
            Self::NotFound(_) => 404,
            Self::Poll(_) | Self::UnexpectedResult(_) | Self::Config(_) | Self::Encode(_) => 500,
        }
    }
}
