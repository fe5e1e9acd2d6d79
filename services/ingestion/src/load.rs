use partition::InputFormat;
use schema::{Dataset, Value};
use serde_json::{Map, Value as JsonValue};

use crate::IngestError;

pub fn load_dataset(bytes: &[u8], format: InputFormat) -> Result<Dataset, IngestError> {
    match format {
        InputFormat::Csv => load_csv(bytes),
        InputFormat::Json => load_json(bytes),
    }
}

/// Header row plus records. Every row must have the header's width.
pub fn load_csv(bytes: &[u8]) -> Result<Dataset, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| IngestError::Parse(format!("csv header: {err}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| IngestError::Parse(format!("csv record: {err}")))?;
        rows.push(record.iter().map(Value::infer).collect());
    }
    Ok(Dataset::from_rows(columns, rows)?)
}

/// Accepts a top-level array of objects and falls back to one object per
/// line when that form does not parse.
pub fn load_json(bytes: &[u8]) -> Result<Dataset, IngestError> {
    let records = match serde_json::from_slice::<Vec<Map<String, JsonValue>>>(bytes) {
        Ok(records) => records,
        Err(_) => parse_json_lines(bytes)?,
    };
    records_to_dataset(records)
}

fn parse_json_lines(bytes: &[u8]) -> Result<Vec<Map<String, JsonValue>>, IngestError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| IngestError::Parse(format!("json input is not utf-8: {err}")))?;
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<Map<String, JsonValue>>(line).map_err(|err| {
            IngestError::Parse(format!("json line {}: {err}", index + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

fn records_to_dataset(records: Vec<Map<String, JsonValue>>) -> Result<Dataset, IngestError> {
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .into_iter()
        .map(|mut record| {
            columns
                .iter()
                .map(|column| record.remove(column).map_or(Value::Null, json_to_value))
                .collect()
        })
        .collect();
    Ok(Dataset::from_rows(columns, rows)?)
}

fn json_to_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(value) => Value::Bool(value),
        JsonValue::Number(number) => {
            if let Some(value) = number.as_i64() {
                Value::Int(value)
            } else if let Some(value) = number.as_f64() {
                Value::Float(value)
            } else {
                Value::Str(number.to_string())
            }
        }
        JsonValue::String(value) => Value::Str(value),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Str(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_cells_are_typed_and_blank_cells_are_null() {
        let dataset = load_csv(b"ID,Name,DKP,active\np1,Alice,1000,true\np2,,2.5,\n").unwrap();
        assert_eq!(dataset.columns(), ["ID", "Name", "DKP", "active"]);
        assert_eq!(
            dataset.rows()[0],
            vec![
                Value::from("p1"),
                Value::from("Alice"),
                Value::Int(1000),
                Value::Bool(true)
            ]
        );
        assert_eq!(
            dataset.rows()[1],
            vec![Value::from("p2"), Value::Null, Value::Float(2.5), Value::Null]
        );
    }

    #[test]
    fn csv_with_ragged_rows_is_a_parse_error() {
        let err = load_csv(b"id,name\np1\n").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)), "{err:?}");
    }

    #[test]
    fn csv_duplicate_headers_are_rejected() {
        let err = load_csv(b"id,id\np1,p2\n").unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)), "{err:?}");
    }

    #[test]
    fn json_array_keeps_first_seen_column_order() {
        let dataset = load_json(
            br#"[{"id":"p1","power":10,"tags":["a"]},{"power":2.5,"id":"p2","extra":null,"guild":{"k":1}}]"#,
        )
        .unwrap();
        assert_eq!(dataset.columns(), ["id", "power", "tags", "extra", "guild"]);
        assert_eq!(dataset.value(0, "tags"), Some(&Value::from(r#"["a"]"#)));
        assert_eq!(dataset.value(0, "guild"), Some(&Value::Null));
        assert_eq!(dataset.value(1, "power"), Some(&Value::Float(2.5)));
        assert_eq!(dataset.value(1, "guild"), Some(&Value::from(r#"{"k":1}"#)));
    }

    #[test]
    fn json_falls_back_to_one_record_per_line() {
        let dataset =
            load_json(b"{\"id\":\"p1\",\"dkp\":1}\n\n{\"id\":\"p2\",\"dkp\":2}\n").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.value(1, "dkp"), Some(&Value::Int(2)));
    }

    #[test]
    fn json_that_fits_neither_form_reports_the_line() {
        let err = load_json(b"{\"id\":\"p1\"}\nnot json\n").unwrap_err();
        match err {
            IngestError::Parse(message) => assert!(message.starts_with("json line 2"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
