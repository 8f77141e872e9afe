//! Raw lab result rows and visits.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CellValue, FieldMap};

/// Candidate columns holding the analyte key, in priority order.
pub const KEY_FIELDS: &[&str] = &["analyte_key", "key", "parameter_key", "param_key"];
/// Candidate columns holding the measured value.
pub const VALUE_FIELDS: &[&str] = &["value", "result", "result_value", "value_text"];
pub const LABEL_FIELDS: &[&str] = &["label", "parameter_label", "display_name", "name"];
pub const UNIT_FIELDS: &[&str] = &["unit", "units", "uom"];
pub const SECTION_FIELDS: &[&str] = &["section", "section_name", "category"];
pub const LOW_FIELDS: &[&str] = &["reference_low", "ref_low", "low", "range_low"];
pub const HIGH_FIELDS: &[&str] = &["reference_high", "ref_high", "high", "range_high"];
pub const FLAG_FIELDS: &[&str] = &["flag", "abnormal_flag"];
pub const METHOD_FIELDS: &[&str] = &["method"];
pub const REMARKS_FIELDS: &[&str] = &["remarks", "remark", "comment"];

pub const PATIENT_FIELDS: &[&str] = &["patient_id"];
pub const DATE_FIELDS: &[&str] = &["date_of_test", "visit_date"];

/// One measurement of one analyte at one visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawResultRow {
    /// Patient identifier as stored
    pub patient_id: String,
    /// Visit date (YYYY-MM-DD)
    pub visit_date: String,
    pub barcode: Option<String>,
    pub notes: Option<String>,
    pub branch: Option<String>,
    /// Analyte key, `None` when the source row had none
    pub analyte_key: Option<String>,
    /// Value exactly as stored
    pub value: CellValue,
    /// Row-level label override
    pub label: Option<String>,
    /// Row-level unit override
    pub unit: Option<String>,
    /// Row-level section override
    pub section: Option<String>,
    pub reference_low: CellValue,
    pub reference_high: CellValue,
    /// Explicit flag as stored (L/H/A or long forms)
    pub flag: Option<String>,
    pub method: Option<String>,
    pub remarks: Option<String>,
}

impl RawResultRow {
    /// Create a row for a single analyte value.
    pub fn new(
        patient_id: impl Into<String>,
        visit_date: impl Into<String>,
        analyte_key: impl Into<String>,
        value: impl Into<CellValue>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            visit_date: visit_date.into(),
            analyte_key: Some(analyte_key.into()),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Read a flat (row-per-analyte) record.
    ///
    /// Each semantic field is taken from the first non-empty column of its
    /// candidate list, so older records with differently named columns keep
    /// working.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let visit = Visit::from_fields(fields);
        Self {
            patient_id: fields.first_text(PATIENT_FIELDS).unwrap_or_default(),
            visit_date: visit.date,
            barcode: visit.barcode,
            notes: visit.notes,
            branch: visit.branch,
            analyte_key: fields.first_text(KEY_FIELDS),
            value: fields.first_present(VALUE_FIELDS).cloned().unwrap_or_default(),
            label: fields.first_text(LABEL_FIELDS),
            unit: fields.first_text(UNIT_FIELDS),
            section: fields.first_text(SECTION_FIELDS),
            reference_low: fields.first_present(LOW_FIELDS).cloned().unwrap_or_default(),
            reference_high: fields.first_present(HIGH_FIELDS).cloned().unwrap_or_default(),
            flag: fields.first_text(FLAG_FIELDS),
            method: fields.first_text(METHOD_FIELDS),
            remarks: fields.first_text(REMARKS_FIELDS),
        }
    }
}

/// Compare two visit dates chronologically.
///
/// Dates are parsed as `YYYY-MM-DD` (a trailing time part is ignored);
/// anything unparseable sorts before parseable dates and falls back to plain
/// string comparison among itself.
pub fn cmp_visit_dates(a: &str, b: &str) -> Ordering {
    match (parse_visit_date(a), parse_visit_date(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn parse_visit_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// A patient visit, identified by its date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Visit {
    /// Visit date (YYYY-MM-DD)
    pub date: String,
    /// Specimen barcode
    pub barcode: Option<String>,
    /// Clinic branch
    pub branch: Option<String>,
    /// Free-text visit notes
    pub notes: Option<String>,
}

impl Visit {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }

    pub fn from_fields(fields: &FieldMap) -> Self {
        Self {
            date: fields.first_text(DATE_FIELDS).unwrap_or_default(),
            barcode: fields.first_text(&["barcode"]),
            branch: fields.first_text(&["branch"]),
            notes: fields.first_text(&["notes"]),
        }
    }

    /// Visit metadata carried by a result row.
    pub fn from_row(row: &RawResultRow) -> Self {
        Self {
            date: row.visit_date.clone(),
            barcode: row.barcode.clone(),
            branch: row.branch.clone(),
            notes: row.notes.clone(),
        }
    }

    /// Fill metadata this visit lacks from another record of the same visit.
    pub fn merge(&mut self, other: &Visit) {
        if self.barcode.is_none() {
            self.barcode = other.barcode.clone();
        }
        if self.branch.is_none() {
            self.branch = other.branch.clone();
        }
        if self.notes.is_none() {
            self.notes = other.notes.clone();
        }
    }
}

/// A result to be written to the flat store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLabResult {
    /// Row ID - generated locally
    pub id: String,
    pub patient_id: String,
    pub visit_date: String,
    pub analyte_key: String,
    pub value: CellValue,
    pub unit: Option<String>,
    pub reference_low: CellValue,
    pub reference_high: CellValue,
    pub flag: Option<String>,
    pub method: Option<String>,
    pub remarks: Option<String>,
    pub barcode: Option<String>,
    pub branch: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl NewLabResult {
    /// Create a new result with required fields.
    pub fn new(
        patient_id: impl Into<String>,
        visit_date: impl Into<String>,
        analyte_key: impl Into<String>,
        value: impl Into<CellValue>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            visit_date: visit_date.into(),
            analyte_key: analyte_key.into(),
            value: value.into(),
            unit: None,
            reference_low: CellValue::Null,
            reference_high: CellValue::Null,
            flag: None,
            method: None,
            remarks: None,
            barcode: None,
            branch: None,
            notes: None,
            created_by: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
