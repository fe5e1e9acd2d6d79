use std::time::Duration;

use crate::LeaderboardError;

const DEFAULT_DATABASE: &str = "rok_ingestion_data";
const DEFAULT_TABLE: &str = "rok_players_curated";
const DEFAULT_RESULT_LOCATION: &str = "s3://rok-ingestion-full-octopus/athena-results/";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardConfig {
    pub database: String,
    pub table: String,
    pub result_location: String,
    pub region: String,
    pub query_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            result_location: DEFAULT_RESULT_LOCATION.to_string(),
            region: DEFAULT_REGION.to_string(),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl LeaderboardConfig {
    pub fn from_env() -> Result<Self, LeaderboardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LeaderboardError> {
        let defaults = Self::default();
        let env_with_fallback =
            |primary: &str, fallback: &str| lookup(primary).or_else(|| lookup(fallback));

        let result_location =
            match env_with_fallback("LEADERBOARD_RESULT_LOCATION", "ATHENA_RESULTS_S3") {
                Some(value) if value.trim().is_empty() => {
                    return Err(LeaderboardError::Config(
                        "query result location must not be empty".to_string(),
                    ));
                }
                Some(value) => value,
                None => defaults.result_location,
            };

        Ok(Self {
            database: env_with_fallback("LEADERBOARD_DATABASE", "ATHENA_DATABASE")
                .unwrap_or(defaults.database),
            table: env_with_fallback("LEADERBOARD_TABLE", "ATHENA_TABLE")
                .unwrap_or(defaults.table),
            result_location,
            region: env_with_fallback("LEADERBOARD_REGION", "AWS_REGION")
                .unwrap_or(defaults.region),
            query_timeout: parse_positive_u64(&lookup, "LEADERBOARD_QUERY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.query_timeout),
            poll_interval: parse_positive_u64(&lookup, "LEADERBOARD_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        })
    }
}

fn parse_positive_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    lookup(key)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
