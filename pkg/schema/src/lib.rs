use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Serialize, Serializer};
use thiserror::Error;

pub const ID_COLUMN: &str = "id";

/// Upper bound on duplicated ids echoed back in a validation message.
pub const DUPLICATE_EXAMPLE_LIMIT: usize = 5;

/// Text emitted for a null cell wherever a value is stringified.
pub const NULL_TOKEN: &str = "None";

// ---------------------------------------------------------------------------
// Scalar values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Infers a typed value from a delimited-text cell. Empty cells are null;
    /// everything that is not a number or boolean stays text, untrimmed.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Null;
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Self::Int(value);
        }
        if let Ok(value) = raw.parse::<f64>()
            && value.is_finite()
        {
            return Self::Float(value);
        }
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        Self::Str(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Canonical text form. Stable across runs and platforms; the content hash
    /// and id coercion both depend on it.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => NULL_TOKEN.to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Str(value) => value.clone(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Str(value) => serializer.serialize_str(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Ordered rows over a fixed, ordered column set.
///
/// Every transformation returns a new dataset; nothing mutates a dataset that
/// another stage may still hold.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.clone()));
            }
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ValidationError::RowWidth {
                    row: index,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|row| &row[index])
    }

    /// Returns a copy with `name` set to `values`, replacing the column in
    /// place if it exists and appending it otherwise.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self, ValidationError> {
        if values.len() != self.rows.len() {
            return Err(ValidationError::RowWidth {
                row: values.len().min(self.rows.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        let mut out = self.clone();
        match out.column_index(name) {
            Some(index) => {
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                out.columns.push(name.to_string());
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(out)
    }

    pub fn with_constant_column(&self, name: &str, value: Value) -> Self {
        let mut out = self.clone();
        let index = match out.column_index(name) {
            Some(index) => index,
            None => {
                out.columns.push(name.to_string());
                for row in &mut out.rows {
                    row.push(Value::Null);
                }
                out.columns.len() - 1
            }
        };
        for row in &mut out.rows {
            row[index] = value.clone();
        }
        out
    }

    /// Returns a copy with every column name lowercased. Two source columns
    /// that collapse onto the same name are rejected.
    pub fn with_lowercase_columns(&self) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let lowered = column.to_lowercase();
            if !seen.insert(lowered.clone()) {
                return Err(ValidationError::DuplicateColumn(lowered));
            }
            columns.push(lowered);
        }
        Ok(Self {
            columns,
            rows: self.rows.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required columns: {}", format_list(.0))]
    MissingColumns(Vec<String>),
    #[error("id column contains null values")]
    NullIds,
    #[error("id column contains empty values")]
    EmptyIds,
    #[error("id column contains duplicate values. Examples: {}", format_list(.0))]
    DuplicateIds(Vec<String>),
    #[error("duplicate column after case normalization: {0}")]
    DuplicateColumn(String),
    #[error("row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

fn format_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Fails when any of `required` is absent. Missing names are reported sorted.
pub fn validate_required_columns<S: AsRef<str>>(
    dataset: &Dataset,
    required: &[S],
) -> Result<(), ValidationError> {
    let missing: BTreeSet<String> = required
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !dataset.has_column(name))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns(missing.into_iter().collect()))
    }
}

/// Fails when `id` holds a null, a blank, or a value seen more than once.
/// Ids are compared in their trimmed text form.
pub fn validate_unique_id(dataset: &Dataset) -> Result<(), ValidationError> {
    let ids = dataset
        .column_values(ID_COLUMN)
        .ok_or_else(|| ValidationError::MissingColumns(vec![ID_COLUMN.to_string()]))?
        .collect::<Vec<_>>();

    if ids.iter().any(|value| value.is_null()) {
        return Err(ValidationError::NullIds);
    }
    let ids: Vec<String> = ids
        .iter()
        .map(|value| value.to_text().trim().to_string())
        .collect();
    if ids.iter().any(String::is_empty) {
        return Err(ValidationError::EmptyIds);
    }

    let mut counts: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
    for id in &ids {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    let mut examples = Vec::new();
    let mut reported = HashSet::new();
    for id in &ids {
        if examples.len() == DUPLICATE_EXAMPLE_LIMIT {
            break;
        }
        if counts[id.as_str()] > 1 && reported.insert(id.as_str()) {
            examples.push(id.clone());
        }
    }
    if examples.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::DuplicateIds(examples))
    }
}

/// Runs both checks. The column check goes first so a missing `id` is
/// reported as such instead of tripping the id-specific check.
pub fn validate_dataset<S: AsRef<str>>(
    dataset: &Dataset,
    required: &[S],
) -> Result<(), ValidationError> {
    validate_required_columns(dataset, required)?;
    validate_unique_id(dataset)
}
