//! Loosely-typed column values as they come out of the result stores.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::is_placeholder;

/// The value of a single source column.
///
/// Result tables hold numbers, free text and placeholders side by side, so a
/// cell is kept as whatever the store handed back until the normalizer looks
/// at it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Build a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Trimmed textual form, `None` for nulls and placeholders.
    pub fn non_empty_text(&self) -> Option<String> {
        if is_placeholder(self) {
            return None;
        }
        match self {
            CellValue::Null => None,
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Text(s) => Some(s.trim().to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// A source record: column name to cell.
///
/// Every store query returns these; typed rows are derived from them by
/// probing ordered candidate column lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, CellValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<CellValue>) {
        self.0.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    /// First cell among `candidates` that is neither null nor a placeholder.
    ///
    /// Candidates are checked in the given order.
    pub fn first_present(&self, candidates: &[&str]) -> Option<&CellValue> {
        candidates
            .iter()
            .filter_map(|column| self.0.get(*column))
            .find(|cell| !is_placeholder(cell))
    }

    /// Trimmed text of the first present candidate.
    pub fn first_text(&self, candidates: &[&str]) -> Option<String> {
        self.first_present(candidates)
            .and_then(CellValue::non_empty_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CellValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, CellValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
