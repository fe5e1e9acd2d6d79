use serde_json::{Map, Value};

use crate::engine::ResultSet;

/// Column carrying the ranked metric in leaderboard queries.
pub const VALUE_COLUMN: &str = "value";

/// Converts engine rows into JSON objects keyed by column name. Empty cells
/// and cells missing from short rows become null.
pub fn rows_to_records(results: &ResultSet) -> Vec<Map<String, Value>> {
    results
        .rows
        .iter()
        .map(|row| {
            results
                .columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let cell = row
                        .get(index)
                        .and_then(Option::as_deref)
                        .filter(|cell| !cell.is_empty());
                    (column.clone(), cell_to_json(column, cell))
                })
                .collect()
        })
        .collect()
}

// The metric column is displayed as a number; anything unparsable is null.
fn cell_to_json(column: &str, cell: Option<&str>) -> Value {
    match cell {
        None => Value::Null,
        Some(text) if column == VALUE_COLUMN => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        Some(text) => Value::String(text.to_string()),
    }
}

/// First cell of `column`, if the result has a row and the cell is non-empty.
pub fn first_value(results: &ResultSet, column: &str) -> Option<String> {
    let index = results.columns.iter().position(|name| name == column)?;
    results
        .rows
        .first()?
        .get(index)?
        .as_deref()
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn result_set(rows: Vec<Vec<Option<&str>>>) -> ResultSet {
        ResultSet {
            columns: vec!["id".into(), "name".into(), "value".into()],
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        }
    }

    #[test]
    fn value_column_is_coerced_to_integer_or_null() {
        let records = rows_to_records(&result_set(vec![
            vec![Some("p1"), Some("Alice"), Some("1500")],
            vec![Some("p2"), Some(""), Some("12.5")],
            vec![Some("p3"), None, Some("")],
        ]));
        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([
                {"id": "p1", "name": "Alice", "value": 1500},
                {"id": "p2", "name": null, "value": null},
                {"id": "p3", "name": null, "value": null}
            ])
        );
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let records = rows_to_records(&result_set(vec![vec![Some("p1")]]));
        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([{"id": "p1", "name": null, "value": null}])
        );
    }

    #[test]
    fn other_numeric_columns_stay_text() {
        let results = ResultSet {
            columns: vec!["power".into()],
            rows: vec![vec![Some("10".into())]],
        };
        assert_eq!(
            serde_json::to_value(rows_to_records(&results)).unwrap(),
            json!([{"power": "10"}])
        );
    }

    #[test]
    fn first_value_ignores_missing_and_empty_cells() {
        let latest = ResultSet {
            columns: vec!["dt".into()],
            rows: vec![vec![Some("2026-01-26".into())]],
        };
        assert_eq!(first_value(&latest, "dt").as_deref(), Some("2026-01-26"));
        let empty = ResultSet {
            columns: vec!["dt".into()],
            rows: vec![vec![None]],
        };
        assert_eq!(first_value(&empty, "dt"), None);
        assert_eq!(first_value(&ResultSet::default(), "dt"), None);
        assert_eq!(first_value(&latest, "kingdom"), None);
    }
}
