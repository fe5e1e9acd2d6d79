pub mod config;
pub mod curated;
pub mod event;
pub mod hashing;
pub mod load;
pub mod normalize;

use std::path::Path;

use partition::{
    InputFormat, PartitionError, PartitionKey, build_curated_key, build_raw_key, file_extension,
    parse_inbox_key,
};
use schema::{Dataset, ValidationError, validate_dataset};
use serde::Serialize;
use store::{BlobStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::IngestionConfig;
pub use event::{ObjectRef, parse_storage_event};
pub use hashing::RunStamp;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Key(#[from] PartitionError),
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("encode error: {0}")]
    Encode(String),
}

impl IngestError {
    /// True when resubmitting the same input can never succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Key(_) | Self::UnsupportedFormat(_) | Self::Parse(_) | Self::Validation(_)
        )
    }
}

/// Progress of one run. Each stage is entered only after the previous one
/// succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Loaded,
    ColumnsNormalized,
    Validated,
    Normalized,
    MetadataStamped,
    Hashed,
    Written,
    Done,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::ColumnsNormalized => "columns_normalized",
            Self::Validated => "validated",
            Self::Normalized => "normalized",
            Self::MetadataStamped => "metadata_stamped",
            Self::Hashed => "hashed",
            Self::Written => "written",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub kingdom: String,
    pub dt: String,
    pub run_id: String,
    pub run_ts: String,
    pub row_count: usize,
    pub bucket: String,
    pub raw_key: String,
    pub curated_key: String,
}

/// Curated output of a run, fully encoded before anything is written.
struct PreparedRun {
    dataset: Dataset,
    curated_bytes: Vec<u8>,
}

/// Raw bytes for the raw tier: either already in memory or a local file.
enum RawSource<'a> {
    Bytes(&'a [u8]),
    File(&'a Path),
}

pub struct IngestionPipeline<S> {
    store: S,
    config: IngestionConfig,
}

impl<S: BlobStore> IngestionPipeline<S> {
    pub fn new(store: S, config: IngestionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Ingests one object dropped under the inbox prefix of `bucket`. The key
    /// is parsed before the object is read.
    pub fn ingest_inbox_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<IngestSummary, IngestError> {
        let inbox = parse_inbox_key(key)?;
        let bytes = self.store.get(bucket, key)?;
        let output_bucket = self.config.output_bucket_for(bucket).to_string();
        self.run(
            &output_bucket,
            &inbox.partition,
            &inbox.filename,
            inbox.format,
            &bytes,
            RawSource::Bytes(&bytes),
        )
    }

    /// Ingests a local file for an explicit kingdom and date. The raw tier
    /// receives a byte-for-byte copy of the file.
    pub fn ingest_local_file(
        &self,
        bucket: &str,
        path: &Path,
        kingdom: &str,
        dt: &str,
    ) -> Result<IngestSummary, IngestError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                PartitionError::InvalidArgument(format!(
                    "input path has no usable filename: {}",
                    path.display()
                ))
            })?;
        let ext = file_extension(filename).unwrap_or_default();
        let format = InputFormat::from_extension(ext)
            .ok_or_else(|| IngestError::UnsupportedFormat(ext.to_ascii_lowercase()))?;
        let partition = PartitionKey::new(self.config.source.as_str(), kingdom, dt)?;
        let bytes = std::fs::read(path).map_err(StoreError::from)?;
        self.run(
            bucket,
            &partition,
            filename,
            format,
            &bytes,
            RawSource::File(path),
        )
    }

    /// Runs every record of a storage notification in order, stopping at the
    /// first failure.
    pub fn handle_storage_event(&self, payload: &[u8]) -> Result<Vec<IngestSummary>, IngestError> {
        let objects = parse_storage_event(payload)?;
        let mut summaries = Vec::with_capacity(objects.len());
        for object in objects {
            summaries.push(self.ingest_inbox_object(&object.bucket, &object.key)?);
        }
        Ok(summaries)
    }

    fn run(
        &self,
        bucket: &str,
        partition: &PartitionKey,
        filename: &str,
        format: InputFormat,
        bytes: &[u8],
        raw: RawSource<'_>,
    ) -> Result<IngestSummary, IngestError> {
        let stamp = RunStamp::now();
        info!(
            run_id = %stamp.run_id,
            kingdom = partition.kingdom(),
            dt = partition.dt(),
            format = %format,
            "ingestion run started"
        );

        let prepared = match self.prepare(bytes, format, partition, &stamp) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(run_id = %stamp.run_id, error = %err, "ingestion run rejected");
                return Err(err);
            }
        };

        let run_ts = stamp.run_ts();
        let raw_key = build_raw_key(partition, &run_ts, filename)?;
        let curated_key = build_curated_key(partition);

        match raw {
            RawSource::Bytes(bytes) => self.store.put(bucket, &raw_key, bytes)?,
            RawSource::File(path) => self.store.put_file(bucket, &raw_key, path)?,
        }
        info!(bucket, key = %raw_key, bytes = bytes.len(), "raw artifact written");
        self.store.put(bucket, &curated_key, &prepared.curated_bytes)?;
        info!(
            bucket,
            key = %curated_key,
            bytes = prepared.curated_bytes.len(),
            "curated artifact written"
        );
        trace_stage(&stamp, RunStage::Written);

        let summary = IngestSummary {
            kingdom: partition.kingdom().to_string(),
            dt: partition.dt().to_string(),
            run_id: stamp.run_id.clone(),
            run_ts,
            row_count: prepared.dataset.len(),
            bucket: bucket.to_string(),
            raw_key,
            curated_key,
        };
        trace_stage(&stamp, RunStage::Done);
        info!(
            run_id = %summary.run_id,
            run_ts = %summary.run_ts,
            row_count = summary.row_count,
            "ingestion run complete"
        );
        Ok(summary)
    }

    fn prepare(
        &self,
        bytes: &[u8],
        format: InputFormat,
        partition: &PartitionKey,
        stamp: &RunStamp,
    ) -> Result<PreparedRun, IngestError> {
        let dataset = load::load_dataset(bytes, format)?;
        trace_stage(stamp, RunStage::Loaded);
        let dataset = dataset.with_lowercase_columns()?;
        trace_stage(stamp, RunStage::ColumnsNormalized);
        validate_dataset(&dataset, &self.config.required_columns)?;
        trace_stage(stamp, RunStage::Validated);
        let dataset = normalize::normalize_dataset(&dataset, partition.kingdom(), partition.dt())?;
        trace_stage(stamp, RunStage::Normalized);
        let dataset = hashing::add_ingestion_metadata_with(&dataset, stamp);
        trace_stage(stamp, RunStage::MetadataStamped);
        let dataset = hashing::add_record_hash(&dataset)?;
        trace_stage(stamp, RunStage::Hashed);

        let curated_bytes = curated::write_curated_parquet(&dataset)?;
        Ok(PreparedRun {
            dataset,
            curated_bytes,
        })
    }
}

fn trace_stage(stamp: &RunStamp, stage: RunStage) {
    debug!(run_id = %stamp.run_id, stage = stage.as_str(), "ingestion stage reached");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store::InMemoryBlobStore;

    use super::*;

    const INBOX_KEY: &str = "inbox/source=rok_players/kingdom=51/dt=2026-01-26/players.csv";

    fn pipeline() -> IngestionPipeline<Arc<InMemoryBlobStore>> {
        IngestionPipeline::new(Arc::new(InMemoryBlobStore::new()), IngestionConfig::default())
    }

    #[test]
    fn inbox_object_produces_raw_and_curated_artifacts() {
        let pipeline = pipeline();
        let csv = b"id,name,dkp\np1,Alice,1000\np2,Bob,2000\n";
        pipeline.store().put("rok-data", INBOX_KEY, csv).unwrap();

        let summary = pipeline.ingest_inbox_object("rok-data", INBOX_KEY).unwrap();
        assert_eq!(summary.kingdom, "51");
        assert_eq!(summary.dt, "2026-01-26");
        assert_eq!(summary.row_count, 2);
        assert_eq!(
            summary.raw_key,
            format!(
                "raw/source=rok_players/kingdom=51/dt=2026-01-26/run_ts={}/players.csv",
                summary.run_ts
            )
        );
        assert_eq!(
            summary.curated_key,
            "curated/source=rok_players/kingdom=51/dt=2026-01-26/players.parquet"
        );
        assert_eq!(pipeline.store().get("rok-data", &summary.raw_key).unwrap(), csv);
        assert!(pipeline.store().get("rok-data", &summary.curated_key).is_ok());
    }

    #[test]
    fn malformed_key_fails_before_any_read() {
        let pipeline = pipeline();
        let err = pipeline
            .ingest_inbox_object("rok-data", "uploads/kingdom=51/players.csv")
            .unwrap_err();
        assert!(matches!(err, IngestError::Key(PartitionError::MalformedKey(_))));
        assert!(err.is_client_error());
    }

    #[test]
    fn validation_failure_writes_nothing() {
        let pipeline = pipeline();
        pipeline
            .store()
            .put("rok-data", INBOX_KEY, b"id,name\np1,A\np1,B\n")
            .unwrap();

        let err = pipeline.ingest_inbox_object("rok-data", INBOX_KEY).unwrap_err();
        assert_eq!(
            err,
            IngestError::Validation(ValidationError::DuplicateIds(vec!["p1".into()]))
        );
        assert_eq!(pipeline.store().keys("rok-data"), vec![INBOX_KEY.to_string()]);
    }

    #[test]
    fn uppercase_headers_are_lowercased_before_validation() {
        let pipeline = pipeline();
        pipeline
            .store()
            .put("rok-data", INBOX_KEY, b"ID,Name\np1,A\n")
            .unwrap();
        let summary = pipeline.ingest_inbox_object("rok-data", INBOX_KEY).unwrap();
        assert_eq!(summary.row_count, 1);
    }

    #[test]
    fn output_bucket_override_redirects_writes() {
        let config = IngestionConfig {
            output_bucket: Some("lake".into()),
            ..IngestionConfig::default()
        };
        let pipeline = IngestionPipeline::new(InMemoryBlobStore::new(), config);
        pipeline
            .store()
            .put("inbound", INBOX_KEY, b"id\np1\n")
            .unwrap();

        let summary = pipeline.ingest_inbox_object("inbound", INBOX_KEY).unwrap();
        assert_eq!(summary.bucket, "lake");
        assert_eq!(pipeline.store().keys("lake").len(), 2);
        assert_eq!(pipeline.store().keys("inbound").len(), 1);
    }

    #[test]
    fn missing_inbox_object_is_a_store_error() {
        let err = pipeline()
            .ingest_inbox_object("rok-data", INBOX_KEY)
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(StoreError::NotFound { .. })));
        assert!(!err.is_client_error());
    }

    #[test]
    fn storage_event_stops_at_the_first_failure() {
        let pipeline = pipeline();
        let good = "inbox/source=rok_players/kingdom=51/dt=2026-01-26/a.csv";
        let bad = "inbox/source=rok_players/kingdom=52/dt=2026-01-26/b.csv";
        let after = "inbox/source=rok_players/kingdom=53/dt=2026-01-26/c.csv";
        pipeline.store().put("rok-data", good, b"id\np1\n").unwrap();
        pipeline.store().put("rok-data", bad, b"name\nx\n").unwrap();
        pipeline.store().put("rok-data", after, b"id\np1\n").unwrap();

        let payload = format!(
            r#"{{"Records":[{}]}}"#,
            [good, bad, after]
                .iter()
                .map(|key| format!(
                    r#"{{"s3":{{"bucket":{{"name":"rok-data"}},"object":{{"key":"{key}"}}}}}}"#
                ))
                .collect::<Vec<_>>()
                .join(",")
        );
        let err = pipeline.handle_storage_event(payload.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            IngestError::Validation(ValidationError::MissingColumns(vec!["id".into()]))
        );
        let keys = pipeline.store().keys("rok-data");
        assert!(keys.iter().any(|key| key.starts_with("curated/source=rok_players/kingdom=51/")));
        assert!(!keys.iter().any(|key| key.contains("kingdom=53") && !key.starts_with("inbox/")));
    }

    #[test]
    fn local_file_with_unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.xlsx");
        std::fs::write(&path, b"id\np1\n").unwrap();
        let err = pipeline()
            .ingest_local_file("local", &path, "51", "2026-01-26")
            .unwrap_err();
        assert_eq!(err, IngestError::UnsupportedFormat("xlsx".into()));
    }

    #[test]
    fn local_file_with_bad_date_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.csv");
        std::fs::write(&path, b"id\np1\n").unwrap();
        let err = pipeline()
            .ingest_local_file("local", &path, "51", "26-01-2026")
            .unwrap_err();
        assert!(matches!(err, IngestError::Key(PartitionError::InvalidArgument(_))));
    }
}
