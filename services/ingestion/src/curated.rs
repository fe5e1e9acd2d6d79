use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use schema::{Dataset, Value};

use crate::IngestError;

/// Arrow type for one dataset column, from the non-null values it holds.
pub fn column_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    let mut ints = 0usize;
    let mut floats = 0usize;
    let mut bools = 0usize;
    let mut other = 0usize;
    for value in values {
        match value {
            Value::Null => {}
            Value::Int(_) => ints += 1,
            Value::Float(_) => floats += 1,
            Value::Bool(_) => bools += 1,
            Value::Str(_) => other += 1,
        }
    }
    match (ints, floats, bools, other) {
        (0, 0, 0, 0) => DataType::Utf8,
        (_, 0, 0, 0) => DataType::Int64,
        (_, _, 0, 0) => DataType::Float64,
        (0, 0, _, 0) => DataType::Boolean,
        _ => DataType::Utf8,
    }
}

pub fn dataset_to_record_batch(dataset: &Dataset) -> Result<RecordBatch, IngestError> {
    let mut fields = Vec::with_capacity(dataset.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.columns().len());

    for (index, name) in dataset.columns().iter().enumerate() {
        let values = dataset.rows().iter().map(|row| &row[index]);
        let data_type = column_type(values.clone());
        let array: ArrayRef = match data_type {
            DataType::Int64 => Arc::new(Int64Array::from(
                values
                    .map(|value| match value {
                        Value::Int(value) => Some(*value),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::Float64 => Arc::new(Float64Array::from(
                values
                    .map(|value| match value {
                        Value::Int(value) => Some(*value as f64),
                        Value::Float(value) => Some(*value),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::Boolean => Arc::new(BooleanArray::from(
                values
                    .map(|value| match value {
                        Value::Bool(value) => Some(*value),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            _ => Arc::new(StringArray::from(
                values
                    .map(|value| match value {
                        Value::Null => None,
                        Value::Str(text) => Some(text.clone()),
                        other => Some(other.to_text()),
                    })
                    .collect::<Vec<_>>(),
            )),
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|err| IngestError::Encode(format!("record batch build failed: {err}")))
}

fn writer_properties() -> WriterProperties {
    let writer = KeyValue {
        key: "writer".to_string(),
        value: Some(format!("rok-ingestion/{}", env!("CARGO_PKG_VERSION"))),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![writer]))
        .build()
}

/// Serializes the whole dataset as a single-row-group Parquet file.
pub fn write_curated_parquet(dataset: &Dataset) -> Result<Vec<u8>, IngestError> {
    let batch = dataset_to_record_batch(dataset)?;
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(writer_properties()))
        .map_err(|err| IngestError::Encode(format!("parquet writer init failed: {err}")))?;
    writer
        .write(&batch)
        .map_err(|err| IngestError::Encode(format!("parquet write failed: {err}")))?;
    writer
        .close()
        .map_err(|err| IngestError::Encode(format!("parquet close failed: {err}")))?;
    Ok(buffer)
}

pub fn read_curated_parquet(bytes: impl Into<Bytes>) -> Result<Vec<RecordBatch>, IngestError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.into())
        .map_err(|err| IngestError::Encode(format!("parquet reader init failed: {err}")))?
        .build()
        .map_err(|err| IngestError::Encode(format!("parquet reader build failed: {err}")))?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(
            batch.map_err(|err| IngestError::Encode(format!("parquet read failed: {err}")))?,
        );
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use arrow::array::Array;

    use super::*;

    fn sample() -> Dataset {
        Dataset::from_rows(
            vec![
                "id".into(),
                "power".into(),
                "ratio".into(),
                "active".into(),
                "note".into(),
                "empty".into(),
            ],
            vec![
                vec![
                    Value::from("p1"),
                    Value::Int(10),
                    Value::Int(1),
                    Value::Bool(true),
                    Value::Int(5),
                    Value::Null,
                ],
                vec![
                    Value::from("p2"),
                    Value::Null,
                    Value::Float(0.5),
                    Value::Null,
                    Value::from("five"),
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn column_types_follow_non_null_values() {
        let dataset = sample();
        let batch = dataset_to_record_batch(&dataset).unwrap();
        let types: Vec<DataType> = batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.data_type().clone())
            .collect();
        assert_eq!(
            types,
            vec![
                DataType::Utf8,
                DataType::Int64,
                DataType::Float64,
                DataType::Boolean,
                DataType::Utf8,
                DataType::Utf8,
            ]
        );
        assert!(batch.schema().fields().iter().all(|field| field.is_nullable()));
    }

    #[test]
    fn mixed_columns_are_stringified_and_nulls_survive() {
        let batch = dataset_to_record_batch(&sample()).unwrap();
        let note = batch
            .column_by_name("note")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(note.value(0), "5");
        assert_eq!(note.value(1), "five");

        let power = batch
            .column_by_name("power")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(power.value(0), 10);
        assert!(power.is_null(1));
    }

    #[test]
    fn parquet_bytes_read_back_with_the_same_shape() {
        let bytes = write_curated_parquet(&sample()).unwrap();
        let batches = read_curated_parquet(bytes).unwrap();
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 2);
        let names: Vec<String> = batches[0]
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect();
        assert_eq!(names, ["id", "power", "ratio", "active", "note", "empty"]);
        let ratio = batches[0]
            .column_by_name("ratio")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(ratio.value(0), 1.0);
        assert_eq!(ratio.value(1), 0.5);
    }
}
