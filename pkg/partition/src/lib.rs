//! Storage key vocabulary shared by ingestion and the leaderboard.
//!
//! Every artifact is addressed by a partition key `(source, kingdom, dt)`
//! rendered as hive-style `name=value` path segments under a tier marker:
//!
//! ```text
//! inbox/source=<source>/kingdom=<kingdom>/dt=<YYYY-MM-DD>/<filename>.(csv|json)
//! raw/source=<source>/kingdom=<kingdom>/dt=<YYYY-MM-DD>/run_ts=<YYYYMMDDTHHMMSSZ>/<filename>
//! curated/source=<source>/kingdom=<kingdom>/dt=<YYYY-MM-DD>/players.parquet
//! ```

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_SOURCE: &str = "rok_players";
pub const CURATED_FILE_NAME: &str = "players.parquet";

static DT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("dt pattern compiles"));
static KINGDOM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,6}$").expect("kingdom pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Structural `YYYY-MM-DD` check. Calendar validity is not enforced.
pub fn is_valid_dt(raw: &str) -> bool {
    DT_PATTERN.is_match(raw)
}

/// One to six ASCII digits.
pub fn is_valid_kingdom(raw: &str) -> bool {
    KINGDOM_PATTERN.is_match(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Case-insensitive match against the accepted extensions.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension of `filename` without the dot, if it has a non-empty stem and
/// a non-empty suffix.
pub fn file_extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

// ---------------------------------------------------------------------------
// Partition key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionKey {
    source: String,
    kingdom: String,
    dt: String,
}

impl PartitionKey {
    /// Rejects values that would not survive a render/parse round trip:
    /// empty components, path separators or a malformed `dt`.
    pub fn new(
        source: impl Into<String>,
        kingdom: impl Into<String>,
        dt: impl Into<String>,
    ) -> Result<Self, PartitionError> {
        let key = Self {
            source: source.into(),
            kingdom: kingdom.into(),
            dt: dt.into(),
        };
        for (name, value) in [("source", &key.source), ("kingdom", &key.kingdom)] {
            if value.is_empty() || value.contains('/') {
                return Err(PartitionError::InvalidArgument(format!(
                    "{name} must be a non-empty path segment, got '{value}'"
                )));
            }
        }
        if !is_valid_dt(&key.dt) {
            return Err(PartitionError::InvalidArgument(format!(
                "invalid dt format (expected YYYY-MM-DD): {}",
                key.dt
            )));
        }
        Ok(key)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kingdom(&self) -> &str {
        &self.kingdom
    }

    pub fn dt(&self) -> &str {
        &self.dt
    }

    fn render_segments(&self) -> String {
        format!(
            "source={}/kingdom={}/dt={}",
            self.source, self.kingdom, self.dt
        )
    }
}

// ---------------------------------------------------------------------------
// Tiers and keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Inbox,
    Raw,
    Curated,
}

impl Tier {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Raw => "raw",
            Self::Curated => "curated",
        }
    }

    fn from_marker(raw: &str) -> Option<Self> {
        match raw {
            "inbox" => Some(Self::Inbox),
            "raw" => Some(Self::Raw),
            "curated" => Some(Self::Curated),
            _ => None,
        }
    }
}

/// A parsed inbound object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxKey {
    pub partition: PartitionKey,
    pub filename: String,
    pub format: InputFormat,
}

impl InboxKey {
    pub fn ext(&self) -> &'static str {
        self.format.as_str()
    }
}

/// A parsed key from any tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    pub tier: Tier,
    pub partition: PartitionKey,
    pub run_ts: Option<String>,
    pub filename: String,
}

struct SplitKey<'a> {
    tier: Tier,
    pairs: HashMap<&'a str, &'a str>,
    filename: &'a str,
}

/// Splits `key` into its tier marker, `name=value` directory segments and the
/// trailing filename. The last segment is always the filename, even when it
/// contains `=`; other segments without `=` are skipped.
fn split_key(key: &str) -> Result<SplitKey<'_>, PartitionError> {
    let (marker, rest) = key
        .split_once('/')
        .ok_or_else(|| PartitionError::MalformedKey(format!("key has no tier marker: {key}")))?;
    let tier = Tier::from_marker(marker).ok_or_else(|| {
        PartitionError::MalformedKey(format!(
            "key must start with 'inbox/', 'raw/' or 'curated/': {key}"
        ))
    })?;

    let mut segments: Vec<&str> = rest.split('/').collect();
    let filename = segments.pop().unwrap_or_default();
    let mut pairs = HashMap::new();
    for segment in segments {
        if let Some((name, value)) = segment.split_once('=') {
            pairs.insert(name, value);
        }
    }
    Ok(SplitKey {
        tier,
        pairs,
        filename,
    })
}

fn required_pair<'a>(
    pairs: &HashMap<&'a str, &'a str>,
    name: &str,
    key: &str,
) -> Result<&'a str, PartitionError> {
    pairs
        .get(name)
        .copied()
        .ok_or_else(|| {
            PartitionError::MalformedKey(format!("key missing '{name}=' segment: {key}"))
        })
}

fn partition_from_pairs(
    pairs: &HashMap<&str, &str>,
    key: &str,
) -> Result<PartitionKey, PartitionError> {
    let source = required_pair(pairs, "source", key)?;
    let kingdom = required_pair(pairs, "kingdom", key)?;
    let dt = required_pair(pairs, "dt", key)?;
    if !is_valid_dt(dt) {
        return Err(PartitionError::MalformedKey(format!(
            "invalid dt format (expected YYYY-MM-DD): {dt}"
        )));
    }
    PartitionKey::new(source, kingdom, dt)
        .map_err(|err| PartitionError::MalformedKey(format!("{err}: {key}")))
}

/// Parses an inbound key of the form
/// `inbox/source=<s>/kingdom=<k>/dt=<YYYY-MM-DD>/<name>.(csv|json)`.
pub fn parse_inbox_key(key: &str) -> Result<InboxKey, PartitionError> {
    if !key.starts_with("inbox/") {
        return Err(PartitionError::MalformedKey(format!(
            "key must start with 'inbox/', got: {key}"
        )));
    }
    let split = split_key(key)?;
    let partition = partition_from_pairs(&split.pairs, key)?;

    if split.filename.is_empty() {
        return Err(PartitionError::MalformedKey(format!(
            "key must end with a filename: {key}"
        )));
    }
    let ext = file_extension(split.filename).ok_or_else(|| {
        PartitionError::MalformedKey(format!(
            "filename must have an extension: {}",
            split.filename
        ))
    })?;
    let format = InputFormat::from_extension(ext).ok_or_else(|| {
        PartitionError::MalformedKey(format!(
            "unsupported file extension (must be csv or json): {}",
            ext.to_ascii_lowercase()
        ))
    })?;

    Ok(InboxKey {
        partition,
        filename: split.filename.to_string(),
        format,
    })
}

/// Parses a key from any tier back into its partition, run timestamp (raw
/// tier only) and filename.
pub fn parse_storage_key(key: &str) -> Result<StorageKey, PartitionError> {
    let split = split_key(key)?;
    let partition = partition_from_pairs(&split.pairs, key)?;
    if split.filename.is_empty() {
        return Err(PartitionError::MalformedKey(format!(
            "key must end with a filename: {key}"
        )));
    }
    let run_ts = match split.tier {
        Tier::Raw => Some(required_pair(&split.pairs, "run_ts", key)?.to_string()),
        Tier::Inbox | Tier::Curated => None,
    };
    Ok(StorageKey {
        tier: split.tier,
        partition,
        run_ts,
        filename: split.filename.to_string(),
    })
}

/// `raw/source=<s>/kingdom=<k>/dt=<dt>/run_ts=<run_ts>/<filename>`. One key
/// per run; raw artifacts are never overwritten.
pub fn build_raw_key(
    partition: &PartitionKey,
    run_ts: &str,
    filename: &str,
) -> Result<String, PartitionError> {
    if run_ts.is_empty() {
        return Err(PartitionError::InvalidArgument(
            "run_ts must be non-empty".to_string(),
        ));
    }
    Ok(format!(
        "{}/{}/run_ts={run_ts}/{filename}",
        Tier::Raw.marker(),
        partition.render_segments()
    ))
}

/// `curated/source=<s>/kingdom=<k>/dt=<dt>/players.parquet`. One key per
/// partition; each run replaces the previous artifact.
pub fn build_curated_key(partition: &PartitionKey) -> String {
    format!(
        "{}/{}/{CURATED_FILE_NAME}",
        Tier::Curated.marker(),
        partition.render_segments()
    )
}
