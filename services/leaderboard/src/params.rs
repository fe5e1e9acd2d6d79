use std::collections::HashMap;
use std::fmt;

use partition::{is_valid_dt, is_valid_kingdom};

use crate::LeaderboardError;
use crate::metrics::{Metric, find_metric};

pub const LATEST: &str = "latest";
pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtSelector {
    Latest,
    Date(String),
}

impl fmt::Display for DtSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Date(dt) => f.write_str(dt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardParams {
    pub kingdom: String,
    pub metric: &'static Metric,
    pub dt: DtSelector,
    pub limit: u32,
}

fn invalid(message: impl Into<String>) -> LeaderboardError {
    LeaderboardError::InvalidParameter(message.into())
}

/// Validates leaderboard query parameters. Checks run in a fixed order, so
/// the first problem found is the one reported.
pub fn parse_params(
    query: &HashMap<String, String>,
) -> Result<LeaderboardParams, LeaderboardError> {
    let kingdom = query
        .get("kingdom")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("kingdom parameter is required"))?;
    if !is_valid_kingdom(kingdom) {
        return Err(invalid("kingdom must be 1-6 digits"));
    }

    let metric_key = query
        .get("metric")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("metric parameter is required"))?;
    let metric =
        find_metric(metric_key).ok_or_else(|| invalid(format!("unknown metric: {metric_key}")))?;

    let dt = match query.get("dt").map(String::as_str) {
        None | Some(LATEST) => DtSelector::Latest,
        Some(raw) if is_valid_dt(raw) => DtSelector::Date(raw.to_string()),
        Some(_) => return Err(invalid("dt must be 'latest' or YYYY-MM-DD format")),
    };

    let limit = match query.get("limit") {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid("limit must be an integer"))?,
        None => i64::from(DEFAULT_LIMIT),
    };
    if !(1..=i64::from(MAX_LIMIT)).contains(&limit) {
        return Err(invalid(format!("limit must be between 1 and {MAX_LIMIT}")));
    }

    Ok(LeaderboardParams {
        kingdom: kingdom.clone(),
        metric,
        dt,
        limit: limit as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn message(pairs: &[(&str, &str)]) -> String {
        parse_params(&query(pairs)).unwrap_err().to_string()
    }

    #[test]
    fn minimal_request_gets_defaults() {
        let params = parse_params(&query(&[("kingdom", "1234"), ("metric", "power")])).unwrap();
        assert_eq!(params.kingdom, "1234");
        assert_eq!(params.metric.column, "power");
        assert_eq!(params.dt, DtSelector::Latest);
        assert_eq!(params.limit, 100);
    }

    #[test]
    fn explicit_values_are_kept() {
        let params = parse_params(&query(&[
            ("kingdom", "51"),
            ("metric", "t45_kills"),
            ("dt", "2026-01-26"),
            ("limit", "500"),
        ]))
        .unwrap();
        assert_eq!(params.dt, DtSelector::Date("2026-01-26".into()));
        assert_eq!(params.dt.to_string(), "2026-01-26");
        assert_eq!(params.limit, 500);
    }

    #[test]
    fn kingdom_rules() {
        assert_eq!(message(&[("metric", "power")]), "kingdom parameter is required");
        assert_eq!(
            message(&[("kingdom", ""), ("metric", "power")]),
            "kingdom parameter is required"
        );
        for bad in ["abc", "1234567", "12a", "1' OR '1'='1"] {
            assert_eq!(
                message(&[("kingdom", bad), ("metric", "power")]),
                "kingdom must be 1-6 digits"
            );
        }
    }

    #[test]
    fn metric_rules() {
        assert_eq!(message(&[("kingdom", "1234")]), "metric parameter is required");
        assert_eq!(
            message(&[("kingdom", "1234"), ("metric", "unknown_metric")]),
            "unknown metric: unknown_metric"
        );
    }

    #[test]
    fn dt_rules() {
        assert_eq!(
            message(&[("kingdom", "1"), ("metric", "power"), ("dt", "invalid-date")]),
            "dt must be 'latest' or YYYY-MM-DD format"
        );
        assert_eq!(
            message(&[("kingdom", "1"), ("metric", "power"), ("dt", "LATEST")]),
            "dt must be 'latest' or YYYY-MM-DD format"
        );
    }

    #[test]
    fn limit_rules() {
        for (raw, expected) in [
            ("abc", "limit must be an integer"),
            ("1.5", "limit must be an integer"),
            ("", "limit must be an integer"),
            ("0", "limit must be between 1 and 500"),
            ("501", "limit must be between 1 and 500"),
            ("-3", "limit must be between 1 and 500"),
        ] {
            assert_eq!(
                message(&[("kingdom", "1"), ("metric", "power"), ("limit", raw)]),
                expected,
                "limit={raw}"
            );
        }
        let params =
            parse_params(&query(&[("kingdom", "1"), ("metric", "power"), ("limit", " 1 ")]))
                .unwrap();
        assert_eq!(params.limit, 1);
    }
}
