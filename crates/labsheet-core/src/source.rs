//! Result stores consumed by the consolidator.

use std::collections::BTreeMap;

use crate::db::DbResult;
use crate::models::{cmp_visit_dates, FieldMap, Visit};

/// Read access to the three lab tables.
///
/// Patient matching is exact but case-insensitive; `visit_date`, when given,
/// is matched exactly. Errors are returned as-is and never retried.
pub trait ResultSource {
    /// Row-per-analyte results.
    fn flat_results(&self, patient_id: &str, visit_date: Option<&str>) -> DbResult<Vec<FieldMap>>;

    /// Row-per-visit results with one column per analyte.
    fn wide_results(&self, patient_id: &str, visit_date: Option<&str>) -> DbResult<Vec<FieldMap>>;

    /// The whole reference-range table.
    fn reference_ranges(&self) -> DbResult<Vec<FieldMap>>;

    /// Visits of a patient across both result shapes, newest first.
    fn list_visits(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let mut visits: BTreeMap<String, Visit> = BTreeMap::new();

        let flat = self.flat_results(patient_id, None)?;
        let wide = self.wide_results(patient_id, None)?;

        for record in flat.iter().chain(wide.iter()) {
            let visit = Visit::from_fields(record);
            if visit.date.is_empty() {
                continue;
            }
            visits
                .entry(visit.date.clone())
                .and_modify(|existing| existing.merge(&visit))
                .or_insert(visit);
        }

        let mut visits: Vec<Visit> = visits.into_values().collect();
        visits.sort_by(|a, b| cmp_visit_dates(&b.date, &a.date));
        Ok(visits)
    }
}
