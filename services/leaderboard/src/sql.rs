//! SQL text for the curated player table.
//!
//! `kingdom` and `dt` are interpolated as single-quoted literals without
//! escaping. Callers must pass values already checked with
//! [`partition::is_valid_kingdom`] and [`partition::is_valid_dt`].

/// Double-quotes `name` unless it is made only of ASCII letters, digits and
/// underscores. Embedded double quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return name.to_string();
    }
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sql_latest_dt(database: &str, table: &str, kingdom: &str) -> String {
    format!("SELECT max(dt) AS dt FROM {database}.{table} WHERE kingdom = '{kingdom}'")
}

pub fn sql_leaderboard(
    database: &str,
    table: &str,
    kingdom: &str,
    dt: &str,
    metric_column: &str,
    limit: u32,
) -> String {
    let metric = quote_ident(metric_column);
    format!(
        "SELECT id, name, {metric} AS value FROM {database}.{table} \
         WHERE kingdom='{kingdom}' AND dt='{dt}' ORDER BY {metric} DESC LIMIT {limit}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_pass_through() {
        assert_eq!(quote_ident("power"), "power");
        assert_eq!(quote_ident("t45_kills"), "t45_kills");
        assert_eq!(quote_ident("Power2"), "Power2");
    }

    #[test]
    fn other_identifiers_are_quoted_and_escaped() {
        assert_eq!(quote_ident("t1 kills"), "\"t1 kills\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_ident("kills-t4"), "\"kills-t4\"");
        assert_eq!(quote_ident("pödër"), "\"pödër\"");
    }

    #[test]
    fn leaderboard_query_renders_exactly() {
        assert_eq!(
            sql_leaderboard("db", "table", "1234", "2026-01-26", "total kills", 100),
            "SELECT id, name, \"total kills\" AS value FROM db.table WHERE kingdom='1234' AND dt='2026-01-26' ORDER BY \"total kills\" DESC LIMIT 100"
        );
        assert_eq!(
            sql_leaderboard("db", "table", "51", "2026-01-01", "power", 5),
            "SELECT id, name, power AS value FROM db.table WHERE kingdom='51' AND dt='2026-01-01' ORDER BY power DESC LIMIT 5"
        );
    }

    #[test]
    fn latest_dt_query_renders_exactly() {
        assert_eq!(
            sql_latest_dt("rok_ingestion_data", "rok_players_curated", "1234"),
            "SELECT max(dt) AS dt FROM rok_ingestion_data.rok_players_curated WHERE kingdom = '1234'"
        );
    }
}
