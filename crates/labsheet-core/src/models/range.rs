//! Reference range metadata.

use serde::{Deserialize, Serialize};

use super::result::{KEY_FIELDS, LABEL_FIELDS, SECTION_FIELDS, UNIT_FIELDS};
use super::{CellValue, FieldMap};
use crate::normalize::to_number;

/// Candidate columns for the lower reference bound.
pub const RANGE_LOW_FIELDS: &[&str] = &["low", "reference_low", "ref_low", "min"];
/// Candidate columns for the upper reference bound.
pub const RANGE_HIGH_FIELDS: &[&str] = &["high", "reference_high", "ref_high", "max"];
/// Order-like columns, checked in priority order.
pub const ORDER_FIELDS: &[&str] = &["order", "sort_order", "rank", "prio"];

/// Display and range metadata for one analyte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeMetadata {
    /// Analyte key (case-sensitive)
    pub analyte_key: String,
    /// Report section; `None` falls back to the key prefix
    pub section: Option<String>,
    /// Display label
    pub label: Option<String>,
    /// Display unit
    pub unit: Option<String>,
    /// Lower bound as stored
    pub low: CellValue,
    /// Upper bound as stored
    pub high: CellValue,
    /// Explicit order rank within the section
    pub order: Option<f64>,
}

impl RangeMetadata {
    /// Create metadata with only a key.
    pub fn new(analyte_key: impl Into<String>) -> Self {
        Self {
            analyte_key: analyte_key.into(),
            section: None,
            label: None,
            unit: None,
            low: CellValue::Null,
            high: CellValue::Null,
            order: None,
        }
    }

    /// Set both bounds.
    pub fn with_bounds(mut self, low: impl Into<CellValue>, high: impl Into<CellValue>) -> Self {
        self.low = low.into();
        self.high = high.into();
        self
    }

    /// Read a reference-range record. Returns `None` when no key column is set.
    pub fn from_fields(fields: &FieldMap) -> Option<Self> {
        let analyte_key = fields.first_text(KEY_FIELDS)?;
        Some(Self {
            analyte_key,
            section: fields.first_text(SECTION_FIELDS),
            label: fields.first_text(LABEL_FIELDS),
            unit: fields.first_text(UNIT_FIELDS),
            low: fields.first_present(RANGE_LOW_FIELDS).cloned().unwrap_or_default(),
            high: fields.first_present(RANGE_HIGH_FIELDS).cloned().unwrap_or_default(),
            order: fields.first_present(ORDER_FIELDS).and_then(to_number),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fields_alternate_key_column() {
        let fields = FieldMap::new()
            .with("param_key", "chem_fbs")
            .with("section", "Blood Chemistry")
            .with("label", "FBS")
            .with("unit", "mg/dL")
            .with("low", 70.0)
            .with("high", "100")
            .with("rank", "2");

        let meta = RangeMetadata::from_fields(&fields).unwrap();
        assert_eq!(meta.analyte_key, "chem_fbs");
        assert_eq!(meta.section.as_deref(), Some("Blood Chemistry"));
        assert_eq!(meta.low, CellValue::Number(70.0));
        assert_eq!(meta.high, CellValue::text("100"));
        assert_eq!(meta.order, Some(2.0));
    }

    #[test]
    fn test_order_priority() {
        let fields = FieldMap::new()
            .with("key", "hema_wbc")
            .with("prio", 9.0)
            .with("sort_order", 3.0);

        let meta = RangeMetadata::from_fields(&fields).unwrap();
        assert_eq!(meta.order, Some(3.0));
    }

    #[test]
    fn test_keyless_record_skipped() {
        let fields = FieldMap::new().with("label", "Orphan");
        assert!(RangeMetadata::from_fields(&fields).is_none());
    }
}
