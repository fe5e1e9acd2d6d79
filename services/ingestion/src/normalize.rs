use schema::{Dataset, ID_COLUMN, ValidationError, Value};

pub const KINGDOM_COLUMN: &str = "kingdom";
pub const SNAPSHOT_DATE_COLUMN: &str = "snapshot_date";

/// Coerces `id` to trimmed text and stamps the partition identifiers onto
/// every row. Expects lowercased column names.
pub fn normalize_dataset(
    dataset: &Dataset,
    kingdom: &str,
    dt: &str,
) -> Result<Dataset, ValidationError> {
    let ids = dataset
        .column_values(ID_COLUMN)
        .ok_or_else(|| ValidationError::MissingColumns(vec![ID_COLUMN.to_string()]))?
        .map(|value| match value {
            Value::Null => Value::Null,
            Value::Str(text) => Value::Str(text.trim().to_string()),
            other => Value::Str(other.to_text().trim().to_string()),
        })
        .collect();

    Ok(dataset
        .with_column(ID_COLUMN, ids)?
        .with_constant_column(KINGDOM_COLUMN, Value::from(kingdom))
        .with_constant_column(SNAPSHOT_DATE_COLUMN, Value::from(dt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_rows(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::from("  p1 "), Value::from(" Alice ")],
                vec![Value::Int(42), Value::from("Bob")],
                vec![Value::from("a b"), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn ids_become_trimmed_text_and_other_columns_are_untouched() {
        let normalized = normalize_dataset(&sample(), "51", "2026-01-26").unwrap();
        let ids: Vec<_> = normalized.column_values("id").unwrap().cloned().collect();
        assert_eq!(
            ids,
            vec![Value::from("p1"), Value::from("42"), Value::from("a b")]
        );
        assert_eq!(normalized.value(0, "name"), Some(&Value::from(" Alice ")));
    }

    #[test]
    fn partition_columns_are_appended_to_every_row() {
        let normalized = normalize_dataset(&sample(), "51", "2026-01-26").unwrap();
        assert_eq!(
            normalized.columns(),
            ["id", "name", KINGDOM_COLUMN, SNAPSHOT_DATE_COLUMN]
        );
        for row in 0..normalized.len() {
            assert_eq!(normalized.value(row, "kingdom"), Some(&Value::from("51")));
            assert_eq!(
                normalized.value(row, "snapshot_date"),
                Some(&Value::from("2026-01-26"))
            );
        }
    }

    #[test]
    fn input_dataset_is_left_unchanged() {
        let input = sample();
        let _ = normalize_dataset(&input, "51", "2026-01-26").unwrap();
        assert_eq!(input, sample());
    }

    #[test]
    fn existing_partition_columns_are_overwritten() {
        let input = Dataset::from_rows(
            vec!["id".into(), "kingdom".into()],
            vec![vec![Value::from("p1"), Value::Int(7)]],
        )
        .unwrap();
        let normalized = normalize_dataset(&input, "51", "2026-01-26").unwrap();
        assert_eq!(normalized.columns(), ["id", "kingdom", "snapshot_date"]);
        assert_eq!(normalized.value(0, "kingdom"), Some(&Value::from("51")));
    }
}
