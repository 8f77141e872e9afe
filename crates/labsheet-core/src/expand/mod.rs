//! Row expander.
//!
//! Results live in two shapes: the current row-per-analyte table and an older
//! row-per-visit table with one column per analyte. Both are turned into the
//! same list of [`RawResultRow`]s here, and nowhere else.

use crate::models::{FieldMap, RawResultRow, Visit, PATIENT_FIELDS};
use crate::normalize::is_placeholder;

/// Columns of a wide row that never hold an analyte.
pub const WIDE_EXCLUDED_COLUMNS: &[&str] = &[
    "patient_id",
    "date_of_test",
    "barcode",
    "notes",
    "branch",
    "id",
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "created_by_initials",
];

/// Source records tagged with their shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRows {
    /// One record per analyte.
    Flat(Vec<FieldMap>),
    /// One record per visit, analytes as columns.
    Wide(Vec<FieldMap>),
}

impl SourceRows {
    pub fn len(&self) -> usize {
        match self {
            SourceRows::Flat(rows) | SourceRows::Wide(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check whether a wide column is excluded from expansion.
pub fn is_excluded_column(column: &str) -> bool {
    WIDE_EXCLUDED_COLUMNS.contains(&column)
}

/// Convert source records into uniform result rows.
pub fn expand_rows(source: SourceRows) -> Vec<RawResultRow> {
    match source {
        SourceRows::Flat(records) => records.iter().map(RawResultRow::from_fields).collect(),
        SourceRows::Wide(records) => records.iter().flat_map(expand_wide_row).collect(),
    }
}

/// Explode one wide record into a row per non-empty analyte column.
pub fn expand_wide_row(record: &FieldMap) -> Vec<RawResultRow> {
    let patient_id = record.first_text(PATIENT_FIELDS).unwrap_or_default();
    let visit = Visit::from_fields(record);

    record
        .iter()
        .filter(|(column, value)| !is_excluded_column(column) && !is_placeholder(value))
        .map(|(column, value)| RawResultRow {
            patient_id: patient_id.clone(),
            visit_date: visit.date.clone(),
            barcode: visit.barcode.clone(),
            notes: visit.notes.clone(),
            branch: visit.branch.clone(),
            analyte_key: Some(column.clone()),
            value: value.clone(),
            ..Default::default()
        })
        .collect()
}
