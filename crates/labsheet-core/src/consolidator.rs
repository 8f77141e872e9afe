//! Report consolidator: the entry point that turns stored results into a
//! report for one patient visit.
//!
//! Pipeline: Flat Rows ─(empty?)→ Wide Rows → Expansion → Assembly → Ordering

use thiserror::Error;

use crate::config::ConsolidatorConfig;
use crate::db::DbError;
use crate::expand::{expand_rows, SourceRows};
use crate::history::{trend_for, HistoryIndex, Trend};
use crate::models::{RawResultRow, Report, ReportItem, Visit};
use crate::ranges::{RangeCache, RangeTable};
use crate::report::build_sections;
use crate::source::ResultSource;

/// Consolidator errors.
#[derive(Error, Debug)]
pub enum ConsolidatorError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type ConsolidatorResult<T> = Result<T, ConsolidatorError>;

/// Builds reports and trend data from a result source.
pub struct ReportConsolidator<'a, S: ResultSource + ?Sized> {
    source: &'a S,
    cache: &'a RangeCache,
    config: ConsolidatorConfig,
}

impl<'a, S: ResultSource + ?Sized> ReportConsolidator<'a, S> {
    /// Create a consolidator with default configuration.
    pub fn new(source: &'a S, cache: &'a RangeCache) -> Self {
        Self {
            source,
            cache,
            config: ConsolidatorConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ConsolidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ConsolidatorConfig {
        &self.config
    }

    /// Visits of a patient, newest first.
    pub fn list_visits(&self, patient_id: &str) -> ConsolidatorResult<Vec<Visit>> {
        Ok(self.source.list_visits(patient_id)?)
    }

    /// Raw rows of one visit. The legacy wide table is only consulted when
    /// the flat table has nothing for this patient and date.
    pub fn fetch_rows(
        &self,
        patient_id: &str,
        visit_date: Option<&str>,
    ) -> ConsolidatorResult<Vec<RawResultRow>> {
        let flat = self.source.flat_results(patient_id, visit_date)?;
        if !flat.is_empty() {
            return Ok(expand_rows(SourceRows::Flat(flat)));
        }

        tracing::debug!(
            patient_id,
            visit_date,
            "No flat results, falling back to wide results"
        );
        let wide = self.source.wide_results(patient_id, visit_date)?;
        Ok(expand_rows(SourceRows::Wide(wide)))
    }

    /// Build the report of one visit, or of the latest visit when no date is
    /// given. Returns `Ok(None)` when there is no such visit or none of its
    /// rows carries a reportable value.
    pub fn build_report(
        &self,
        patient_id: &str,
        visit_date: Option<&str>,
    ) -> ConsolidatorResult<Option<Report>> {
        let date = match visit_date {
            Some(date) => date.to_string(),
            None => match self.list_visits(patient_id)?.into_iter().next() {
                Some(visit) => visit.date,
                None => return Ok(None),
            },
        };

        let rows = self.fetch_rows(patient_id, Some(&date))?;
        if rows.is_empty() {
            return Ok(None);
        }

        let ranges = self.cache.get_or_load(self.source)?;
        let report = assemble(patient_id, &date, &rows, &ranges);
        if report.is_empty() {
            tracing::debug!(patient_id, visit_date = %date, "Visit has no reportable values");
            return Ok(None);
        }
        tracing::debug!(
            patient_id,
            visit_date = %date,
            sections = report.sections.len(),
            flagged = report.flagged_count(),
            "Built lab report"
        );
        Ok(Some(report))
    }

    /// Build every visit's report of a patient, newest first.
    pub fn build_all_reports(&self, patient_id: &str) -> ConsolidatorResult<Vec<Report>> {
        let visits = self.list_visits(patient_id)?;
        if visits.is_empty() {
            return Ok(Vec::new());
        }

        let ranges = self.cache.get_or_load(self.source)?;
        let mut reports = Vec::with_capacity(visits.len());
        for visit in visits {
            let rows = self.fetch_rows(patient_id, Some(&visit.date))?;
            if rows.is_empty() {
                continue;
            }
            let report = assemble(patient_id, &visit.date, &rows, &ranges);
            if !report.is_empty() {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Index all past values of a patient for trend lookups.
    pub fn build_history(&self, patient_id: &str) -> ConsolidatorResult<HistoryIndex> {
        Ok(HistoryIndex::from_reports(&self.build_all_reports(patient_id)?))
    }

    /// Previous value, delta and trend list for an item of the visit at
    /// `visit_date`.
    pub fn trend_for(&self, item: &ReportItem, visit_date: &str, history: &HistoryIndex) -> Trend {
        let mut trend = trend_for(item, visit_date, history, self.config.trend_depth);
        if self.config.is_extra_remarks_key(&item.key) {
            trend.history.clear();
        }
        trend
    }
}

fn assemble(patient_id: &str, date: &str, rows: &[RawResultRow], ranges: &RangeTable) -> Report {
    let mut visit = Visit::new(date);
    for row in rows {
        visit.merge(&Visit::from_row(row));
    }

    Report {
        patient_id: patient_id.to_string(),
        visit,
        sections: build_sections(rows, ranges),
    }
}
