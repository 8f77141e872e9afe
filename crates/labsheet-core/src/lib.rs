//! Labsheet Core Library
//!
//! Consolidates a patient's stored lab results into a sectioned, flagged and
//! ordered report for one visit, with trend data from earlier visits.
//!
//! # Architecture
//!
//! ```text
//!   lab_results (flat)          lab_results_wide (legacy)
//!          │                              │
//!          └──────────┬───────────────────┘
//!                     ▼
//!               Row Expansion ──────────── RawResultRow
//!                     │
//!                     ▼
//!   reference_ranges → Range Cache → Report Assembly (flags, labels, units)
//!                     │                   │
//!                     │                   ▼
//!                     │             Section Ordering
//!                     │                   │
//!                     ▼                   ▼
//!               History Index  ◄──────  Report
//!                     │
//!                     ▼
//!            Previous value / delta / trend list
//! ```
//!
//! # Core Principle
//!
//! **Reports are derived, never stored.** Every report is rebuilt from the raw
//! result rows and the reference-range table.
//!
//! # Modules
//!
//! - [`db`]: SQLite store for flat results, wide results and reference ranges
//! - [`models`]: Domain types (RawResultRow, Report, RangeMetadata, etc.)
//! - [`expand`]: Flat and wide row expansion
//! - [`ranges`]: Reference-range table and cache
//! - [`report`]: Report assembly and ordering
//! - [`history`]: Previous values, deltas and trend lists
//! - [`consolidator`]: Entry point tying the pipeline together

pub mod config;
pub mod consolidator;
pub mod db;
pub mod expand;
pub mod history;
pub mod models;
pub mod normalize;
pub mod ranges;
pub mod report;
pub mod source;

// Re-export commonly used types
pub use config::ConsolidatorConfig;
pub use consolidator::{ConsolidatorError, ReportConsolidator};
pub use db::Database;
pub use history::{HistoryIndex, Trend};
pub use models::{
    CellValue, FieldMap, Flag, NewLabResult, RangeMetadata, RawResultRow, Report, ReportItem,
    ReportSection, ResultValue, Visit,
};
pub use ranges::{RangeCache, RangeTable};
pub use source::ResultSource;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LabsheetError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for LabsheetError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::Constraint(what) => LabsheetError::InvalidInput(what),
            other => LabsheetError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ConsolidatorError> for LabsheetError {
    fn from(e: ConsolidatorError) -> Self {
        match e {
            ConsolidatorError::Database(db) => db.into(),
        }
    }
}

impl From<serde_json::Error> for LabsheetError {
    fn from(e: serde_json::Error) -> Self {
        LabsheetError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LabsheetError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LabsheetError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<LabsheetCore>, LabsheetError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(LabsheetCore::new(db)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<LabsheetCore>, LabsheetError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(LabsheetCore::new(db)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
///
/// Reference ranges are cached per object. Writing a range through
/// [`LabsheetCore::upsert_reference_range`] drops the cache.
#[derive(uniffi::Object)]
pub struct LabsheetCore {
    db: Arc<Mutex<Database>>,
    cache: Mutex<Arc<RangeCache>>,
    config: ConsolidatorConfig,
}

impl LabsheetCore {
    fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            cache: Mutex::new(Arc::new(RangeCache::new())),
            config: ConsolidatorConfig::default(),
        }
    }

    fn range_cache(&self) -> Result<Arc<RangeCache>, LabsheetError> {
        Ok(self.cache.lock()?.clone())
    }
}

#[uniffi::export]
impl LabsheetCore {
    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Build the report of a visit, or of the latest visit when `visit_date`
    /// is omitted.
    pub fn get_report(
        &self,
        patient_id: String,
        visit_date: Option<String>,
    ) -> Result<Option<FfiReport>, LabsheetError> {
        let db = self.db.lock()?;
        let cache = self.range_cache()?;
        let consolidator =
            ReportConsolidator::new(&*db, &cache).with_config(self.config.clone());
        let report = consolidator.build_report(&patient_id, visit_date.as_deref())?;
        Ok(report.map(|r| r.into()))
    }

    /// Build the report of a visit as JSON.
    pub fn get_report_json(
        &self,
        patient_id: String,
        visit_date: Option<String>,
    ) -> Result<Option<String>, LabsheetError> {
        let db = self.db.lock()?;
        let cache = self.range_cache()?;
        let consolidator =
            ReportConsolidator::new(&*db, &cache).with_config(self.config.clone());
        match consolidator.build_report(&patient_id, visit_date.as_deref())? {
            Some(report) => Ok(Some(report.to_json()?)),
            None => Ok(None),
        }
    }

    /// Visits of a patient, newest first.
    pub fn list_visits(&self, patient_id: String) -> Result<Vec<FfiVisit>, LabsheetError> {
        let db = self.db.lock()?;
        let cache = self.range_cache()?;
        let consolidator = ReportConsolidator::new(&*db, &cache);
        let visits = consolidator.list_visits(&patient_id)?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    /// Trend data for one analyte of a visit.
    pub fn get_trend(
        &self,
        patient_id: String,
        visit_date: String,
        analyte_key: String,
    ) -> Result<FfiTrend, LabsheetError> {
        let db = self.db.lock()?;
        let cache = self.range_cache()?;
        let consolidator =
            ReportConsolidator::new(&*db, &cache).with_config(self.config.clone());

        let report = consolidator
            .build_report(&patient_id, Some(&visit_date))?
            .ok_or_else(|| {
                LabsheetError::NotFound(format!("visit {} of {}", visit_date, patient_id))
            })?;
        let item = report.item(&analyte_key).ok_or_else(|| {
            LabsheetError::NotFound(format!("{} on {}", analyte_key, visit_date))
        })?;

        let history = consolidator.build_history(&patient_id)?;
        Ok(consolidator.trend_for(item, &visit_date, &history).into())
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Store one flat result row. Returns the generated row ID.
    pub fn record_result(&self, result: FfiLabResult) -> Result<String, LabsheetError> {
        if result.patient_id.trim().is_empty() || result.analyte_key.trim().is_empty() {
            return Err(LabsheetError::InvalidInput(
                "patient_id and analyte_key are required".into(),
            ));
        }

        let db = self.db.lock()?;
        let new_result: NewLabResult = result.into();
        db.insert_lab_result(&new_result)?;
        Ok(new_result.id)
    }

    /// Add or update a reference range.
    pub fn upsert_reference_range(&self, range: FfiReferenceRange) -> Result<(), LabsheetError> {
        let db = self.db.lock()?;
        db.upsert_reference_range(&range.into())?;
        *self.cache.lock()? = Arc::new(RangeCache::new());
        Ok(())
    }

    /// Get a reference range by analyte key.
    pub fn get_reference_range(
        &self,
        analyte_key: String,
    ) -> Result<Option<FfiReferenceRange>, LabsheetError> {
        let db = self.db.lock()?;
        let range = db.get_reference_range(&analyte_key)?;
        Ok(range.map(|r| r.into()))
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReport {
    pub patient_id: String,
    pub visit: FfiVisit,
    pub sections: Vec<FfiSection>,
}

impl From<Report> for FfiReport {
    fn from(report: Report) -> Self {
        Self {
            patient_id: report.patient_id,
            visit: report.visit.into(),
            sections: report.sections.into_iter().map(|s| s.into()).collect(),
        }
    }
}

/// FFI-safe report section.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSection {
    pub name: String,
    pub items: Vec<FfiItem>,
}

impl From<ReportSection> for FfiSection {
    fn from(section: ReportSection) -> Self {
        Self {
            name: section.name,
            items: section.items.into_iter().map(|i| i.into()).collect(),
        }
    }
}

/// FFI-safe report item. Exactly one of `value_number` and `value_text` is set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiItem {
    pub key: String,
    pub label: String,
    pub unit: String,
    pub value_number: Option<f64>,
    pub value_text: Option<String>,
    pub reference_range: Option<String>,
    pub flag: Option<String>,
    pub method: Option<String>,
    pub remarks: Option<String>,
}

impl From<ReportItem> for FfiItem {
    fn from(item: ReportItem) -> Self {
        let reference_range = item.reference_display();
        let (value_number, value_text) = match item.value {
            ResultValue::Number(n) => (Some(n), None),
            ResultValue::Text(s) => (None, Some(s)),
        };
        Self {
            key: item.key,
            label: item.label,
            unit: item.unit,
            value_number,
            value_text,
            reference_range,
            flag: item.flag.map(|f| f.as_str().to_string()),
            method: item.method,
            remarks: item.remarks,
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub date: String,
    pub barcode: Option<String>,
    pub branch: Option<String>,
    pub notes: Option<String>,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        Self {
            date: visit.date,
            barcode: visit.barcode,
            branch: visit.branch,
            notes: visit.notes,
        }
    }
}

/// FFI-safe past value.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistoricalValue {
    pub date: String,
    pub display: String,
    pub value: Option<f64>,
    pub unit: String,
}

impl From<history::HistoricalValue> for FfiHistoricalValue {
    fn from(value: history::HistoricalValue) -> Self {
        Self {
            date: value.date,
            display: value.raw.to_string(),
            value: value.value,
            unit: value.unit,
        }
    }
}

/// FFI-safe trend.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTrend {
    pub previous_date: Option<String>,
    pub previous_value: Option<f64>,
    pub delta: Option<f64>,
    pub percent: Option<f64>,
    pub history: Vec<FfiHistoricalValue>,
}

impl From<Trend> for FfiTrend {
    fn from(trend: Trend) -> Self {
        let (previous_date, previous_value) = match trend.previous {
            Some(p) => (Some(p.date), Some(p.value)),
            None => (None, None),
        };
        Self {
            previous_date,
            previous_value,
            delta: trend.delta.map(|d| d.delta),
            percent: trend.delta.and_then(|d| d.percent),
            history: trend.history.into_iter().map(|h| h.into()).collect(),
        }
    }
}

/// FFI-safe reference range.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReferenceRange {
    pub analyte_key: String,
    pub section: Option<String>,
    pub label: Option<String>,
    pub unit: Option<String>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub order: Option<f64>,
}

impl From<RangeMetadata> for FfiReferenceRange {
    fn from(range: RangeMetadata) -> Self {
        Self {
            analyte_key: range.analyte_key,
            section: range.section,
            label: range.label,
            unit: range.unit,
            low: normalize::to_number(&range.low),
            high: normalize::to_number(&range.high),
            order: range.order,
        }
    }
}

impl From<FfiReferenceRange> for RangeMetadata {
    fn from(range: FfiReferenceRange) -> Self {
        RangeMetadata {
            analyte_key: range.analyte_key,
            section: range.section,
            label: range.label,
            unit: range.unit,
            low: range.low.into(),
            high: range.high.into(),
            order: range.order,
        }
    }
}

/// FFI-safe flat result for writing.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLabResult {
    pub patient_id: String,
    pub visit_date: String,
    pub analyte_key: String,
    pub value: String,
    pub unit: Option<String>,
    pub flag: Option<String>,
    pub method: Option<String>,
    pub remarks: Option<String>,
    pub barcode: Option<String>,
    pub branch: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

impl From<FfiLabResult> for NewLabResult {
    fn from(result: FfiLabResult) -> Self {
        NewLabResult {
            unit: result.unit,
            flag: result.flag,
            method: result.method,
            remarks: result.remarks,
            barcode: result.barcode,
            branch: result.branch,
            notes: result.notes,
            created_by: result.created_by,
            ..NewLabResult::new(
                result.patient_id,
                result.visit_date,
                result.analyte_key,
                result.value,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab_result(patient: &str, date: &str, key: &str, value: &str) -> FfiLabResult {
        FfiLabResult {
            patient_id: patient.into(),
            visit_date: date.into(),
            analyte_key: key.into(),
            value: value.into(),
            unit: None,
            flag: None,
            method: None,
            remarks: None,
            barcode: Some("BC-1".into()),
            branch: None,
            notes: None,
            created_by: None,
        }
    }

    fn fbs_range(high: f64) -> FfiReferenceRange {
        FfiReferenceRange {
            analyte_key: "chem_fbs".into(),
            section: None,
            label: Some("FBS".into()),
            unit: Some("mg/dL".into()),
            low: Some(70.0),
            high: Some(high),
            order: None,
        }
    }

    #[test]
    fn test_record_and_get_report() {
        let core = open_database_in_memory().unwrap();
        core.upsert_reference_range(fbs_range(100.0)).unwrap();
        core.record_result(lab_result("P1", "2024-01-10", "chem_fbs", "130"))
            .unwrap();

        let report = core.get_report("P1".into(), None).unwrap().unwrap();
        assert_eq!(report.visit.date, "2024-01-10");
        assert_eq!(report.visit.barcode.as_deref(), Some("BC-1"));
        assert_eq!(report.sections[0].name, "Blood Chemistry");

        let item = &report.sections[0].items[0];
        assert_eq!(item.value_number, Some(130.0));
        assert_eq!(item.value_text, None);
        assert_eq!(item.flag.as_deref(), Some("H"));
        assert_eq!(item.reference_range.as_deref(), Some("70 - 100"));
    }

    #[test]
    fn test_range_upsert_drops_cache() {
        let core = open_database_in_memory().unwrap();
        core.upsert_reference_range(fbs_range(100.0)).unwrap();
        core.record_result(lab_result("P1", "2024-01-10", "chem_fbs", "130"))
            .unwrap();

        let before = core.get_report("P1".into(), None).unwrap().unwrap();
        assert_eq!(before.sections[0].items[0].flag.as_deref(), Some("H"));

        core.upsert_reference_range(fbs_range(140.0)).unwrap();
        let after = core.get_report("P1".into(), None).unwrap().unwrap();
        assert_eq!(after.sections[0].items[0].flag, None);
    }

    #[test]
    fn test_record_result_requires_key() {
        let core = open_database_in_memory().unwrap();
        let result = core.record_result(lab_result("P1", "2024-01-10", " ", "1"));
        assert!(matches!(result, Err(LabsheetError::InvalidInput(_))));
    }

    #[test]
    fn test_get_trend() {
        let core = open_database_in_memory().unwrap();
        core.record_result(lab_result("P1", "2023-06-01", "chem_fbs", "80"))
            .unwrap();
        core.record_result(lab_result("P1", "2024-01-10", "chem_fbs", "100"))
            .unwrap();

        let trend = core
            .get_trend("P1".into(), "2024-01-10".into(), "chem_fbs".into())
            .unwrap();
        assert_eq!(trend.previous_date.as_deref(), Some("2023-06-01"));
        assert_eq!(trend.delta, Some(20.0));
        assert_eq!(trend.percent, Some(25.0));
        assert_eq!(trend.history.len(), 1);
        assert_eq!(trend.history[0].display, "80");
    }

    #[test]
    fn test_get_trend_missing_item() {
        let core = open_database_in_memory().unwrap();
        core.record_result(lab_result("P1", "2024-01-10", "chem_fbs", "100"))
            .unwrap();

        let result = core.get_trend("P1".into(), "2024-01-10".into(), "hema_wbc".into());
        assert!(matches!(result, Err(LabsheetError::NotFound(_))));
    }

    #[test]
    fn test_missing_patient_report_is_none() {
        let core = open_database_in_memory().unwrap();
        assert!(core.get_report("nobody".into(), None).unwrap().is_none());
        assert!(core.list_visits("nobody".into()).unwrap().is_empty());
    }

    #[test]
    fn test_report_json() {
        let core = open_database_in_memory().unwrap();
        core.record_result(lab_result("P1", "2024-01-10", "hema_wbc", "7.2"))
            .unwrap();

        let json = core.get_report_json("P1".into(), None).unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["sections"][0]["name"], "Hematology");
        assert_eq!(parsed["sections"][0]["items"][0]["value"], 7.2);
    }
}
