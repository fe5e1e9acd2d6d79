use chrono::{DateTime, SubsecRound, Utc};
use schema::{Dataset, ValidationError, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::normalize::{KINGDOM_COLUMN, SNAPSHOT_DATE_COLUMN};

pub const RECORD_HASH_COLUMN: &str = "record_hash";
pub const INGESTED_AT_COLUMN: &str = "ingested_at";
pub const RUN_ID_COLUMN: &str = "run_id";

/// Columns that never contribute to a record hash.
pub const HASH_EXCLUDED_COLUMNS: [&str; 5] = [
    RECORD_HASH_COLUMN,
    INGESTED_AT_COLUMN,
    RUN_ID_COLUMN,
    KINGDOM_COLUMN,
    SNAPSHOT_DATE_COLUMN,
];

const HASH_DELIMITER: &str = "|";

/// Identity of one pipeline run. Created once at run start; every record and
/// the raw artifact path take their run metadata from the same stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl RunStamp {
    pub fn now() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now().trunc_subsecs(0),
        }
    }

    /// `YYYYMMDDTHHMMSSZ`
    pub fn run_ts(&self) -> String {
        self.started_at.format("%Y%m%dT%H%M%SZ").to_string()
    }

    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub fn ingested_at(&self) -> String {
        self.started_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Stamps `ingested_at` and `run_id` from a fresh [`RunStamp`].
pub fn add_ingestion_metadata(dataset: &Dataset) -> Dataset {
    add_ingestion_metadata_with(dataset, &RunStamp::now())
}

pub fn add_ingestion_metadata_with(dataset: &Dataset, stamp: &RunStamp) -> Dataset {
    dataset
        .with_constant_column(INGESTED_AT_COLUMN, Value::from(stamp.ingested_at()))
        .with_constant_column(RUN_ID_COLUMN, Value::from(stamp.run_id.as_str()))
}

pub fn add_record_hash(dataset: &Dataset) -> Result<Dataset, ValidationError> {
    let business = business_columns(dataset);
    let hashes = dataset
        .rows()
        .iter()
        .map(|row| Value::Str(hash_row(row, &business)))
        .collect();
    dataset.with_column(RECORD_HASH_COLUMN, hashes)
}

/// Hash for one row, by index. `None` when the row does not exist.
pub fn record_hash_for_row(dataset: &Dataset, row: usize) -> Option<String> {
    let business = business_columns(dataset);
    dataset.rows().get(row).map(|row| hash_row(row, &business))
}

/// Indexes of the hashed columns, in lexicographic name order.
fn business_columns(dataset: &Dataset) -> Vec<usize> {
    let mut columns: Vec<(&str, usize)> = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !HASH_EXCLUDED_COLUMNS.contains(&name.as_str()))
        .map(|(index, name)| (name.as_str(), index))
        .collect();
    columns.sort_unstable();
    columns.into_iter().map(|(_, index)| index).collect()
}

fn hash_row(row: &[Value], business: &[usize]) -> String {
    let joined = business
        .iter()
        .map(|&index| row[index].to_text())
        .collect::<Vec<_>>()
        .join(HASH_DELIMITER);
    hex::encode(Sha256::digest(joined.as_bytes()))
}
