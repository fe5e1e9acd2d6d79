use partition::DEFAULT_SOURCE;
use schema::ID_COLUMN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    pub source: String,
    /// Bucket receiving raw and curated artifacts. `None` writes back to the
    /// bucket the inbound object came from.
    pub output_bucket: Option<String>,
    pub required_columns: Vec<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            output_bucket: None,
            required_columns: vec![ID_COLUMN.to_string()],
        }
    }
}

impl IngestionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let source = env_with_fallback(&lookup, "ROK_INGEST_SOURCE", "SOURCE_NAME")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.source);
        let output_bucket =
            env_with_fallback(&lookup, "ROK_INGEST_OUTPUT_BUCKET", "OUTPUT_BUCKET")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        let required_columns = env_with_fallback(
            &lookup,
            "ROK_INGEST_REQUIRED_COLUMNS",
            "REQUIRED_COLUMNS",
        )
        .map(|raw| parse_column_list(&raw))
        .filter(|columns| !columns.is_empty())
        .unwrap_or(defaults.required_columns);

        Self {
            source,
            output_bucket,
            required_columns,
        }
    }

    pub fn output_bucket_for<'a>(&'a self, input_bucket: &'a str) -> &'a str {
        self.output_bucket.as_deref().unwrap_or(input_bucket)
    }
}

fn env_with_fallback(
    lookup: &impl Fn(&str) -> Option<String>,
    primary: &str,
    fallback: &str,
) -> Option<String> {
    lookup(primary).or_else(|| lookup(fallback))
}

/// Column names are compared after lowercasing, so the configured list is
/// lowercased too.
fn parse_column_list(raw: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for column in raw.split(',') {
        let column = column.trim().to_ascii_lowercase();
        if !column.is_empty() && !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}
