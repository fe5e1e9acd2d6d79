use serde::Serialize;
use serde_json::{Map, Value};
use partition::is_valid_dt;
use tracing::{error, info};

use crate::LeaderboardError;
use crate::config::LeaderboardConfig;
use crate::engine::{QueryEngine, ResultSet};
use crate::params::{DtSelector, LeaderboardParams};
use crate::poller::QueryPoller;
use crate::results::{first_value, rows_to_records};
use crate::sql::{sql_latest_dt, sql_leaderboard};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardPayload {
    pub kingdom: String,
    pub dt: String,
    pub metric: String,
    pub limit: u32,
    pub rows: Vec<Map<String, Value>>,
}

pub struct LeaderboardService<E> {
    engine: E,
    config: LeaderboardConfig,
    poller: QueryPoller,
}

impl<E: QueryEngine> LeaderboardService<E> {
    pub fn new(engine: E, config: LeaderboardConfig) -> Self {
        let poller = QueryPoller::new(config.query_timeout, config.poll_interval);
        info!(
            database = %config.database,
            table = %config.table,
            region = %config.region,
            "leaderboard service configured"
        );
        Self {
            engine,
            config,
            poller,
        }
    }

    /// Builds the service from `LEADERBOARD_*` settings, the way a gateway
    /// invocation host does at cold start.
    pub fn from_env(engine: E) -> Result<Self, LeaderboardError> {
        Ok(Self::new(engine, LeaderboardConfig::from_env()?))
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    /// Most recent snapshot date for `kingdom`, or `None` when the kingdom
    /// has no curated data.
    pub fn latest_dt(&self, kingdom: &str) -> Result<Option<String>, LeaderboardError> {
        let sql = sql_latest_dt(&self.config.database, &self.config.table, kingdom);
        let results = self.run(&sql)?;
        Ok(first_value(&results, "dt"))
    }

    pub fn leaderboard(
        &self,
        params: &LeaderboardParams,
    ) -> Result<LeaderboardPayload, LeaderboardError> {
        info!(
            kingdom = %params.kingdom,
            metric = params.metric.key,
            dt = %params.dt,
            limit = params.limit,
            "leaderboard request"
        );
        let dt = match &params.dt {
            DtSelector::Date(dt) => dt.clone(),
            DtSelector::Latest => {
                let dt = self.latest_dt(&params.kingdom)?.ok_or_else(|| {
                    LeaderboardError::NotFound(format!(
                        "No data found for kingdom {}",
                        params.kingdom
                    ))
                })?;
                if !is_valid_dt(&dt) {
                    error!(kingdom = %params.kingdom, dt = %dt, "latest dt is not a date");
                    return Err(LeaderboardError::UnexpectedResult(format!(
                        "latest dt for kingdom {} is not YYYY-MM-DD",
                        params.kingdom
                    )));
                }
                info!(kingdom = %params.kingdom, dt = %dt, "resolved latest dt");
                dt
            }
        };

        let sql = sql_leaderboard(
            &self.config.database,
            &self.config.table,
            &params.kingdom,
            &dt,
            params.metric.column,
            params.limit,
        );
        let results = self.run(&sql)?;
        Ok(LeaderboardPayload {
            kingdom: params.kingdom.clone(),
            dt,
            metric: params.metric.key.to_string(),
            limit: params.limit,
            rows: rows_to_records(&results),
        })
    }

    fn run(&self, sql: &str) -> Result<ResultSet, LeaderboardError> {
        Ok(self.poller.run(
            &self.engine,
            sql,
            &self.config.database,
            &self.config.result_location,
        )?)
    }
}
