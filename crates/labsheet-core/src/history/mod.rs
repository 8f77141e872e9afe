//! Historical delta finder for trend display.
//!
//! Works over a [`HistoryIndex`]: visit dates newest first, and per date the
//! items recorded at that visit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{cmp_visit_dates, Report, ReportItem, ResultValue};

/// Default number of past visits shown in a trend list.
pub const DEFAULT_TREND_DEPTH: usize = 3;

/// Labels (lowercased, letters only) of free-text fields never trended.
const REMARKS_LABELS: &[&str] = &[
    "remark",
    "remarks",
    "note",
    "notes",
    "comment",
    "comments",
    "interpretation",
    "result",
    "results",
];

/// One analyte value at one past visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub raw: ResultValue,
    pub unit: String,
}

/// Past values of a patient, by visit date then analyte key.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    dates: Vec<String>,
    values: HashMap<String, HashMap<String, HistoryEntry>>,
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every item of every report.
    pub fn from_reports(reports: &[Report]) -> Self {
        let mut index = Self::new();
        for report in reports {
            for item in report.items() {
                index.insert(&report.visit.date, item);
            }
        }
        index
    }

    /// Record an item seen at `date`.
    pub fn insert(&mut self, date: &str, item: &ReportItem) {
        if !self.values.contains_key(date) {
            let pos = self
                .dates
                .iter()
                .position(|d| cmp_visit_dates(d, date).is_lt())
                .unwrap_or(self.dates.len());
            self.dates.insert(pos, date.to_string());
        }
        self.values.entry(date.to_string()).or_default().insert(
            item.key.clone(),
            HistoryEntry {
                raw: item.value.clone(),
                unit: item.unit.clone(),
            },
        );
    }

    /// Visit dates, newest first.
    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn entry(&self, date: &str, key: &str) -> Option<&HistoryEntry> {
        self.values.get(date)?.get(key)
    }

    /// Dates strictly older than `current`, newest first.
    fn older_than<'a>(&'a self, current: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.dates
            .iter()
            .filter(move |d| cmp_visit_dates(d, current).is_lt())
    }
}

/// The most recent earlier numeric value of an analyte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviousValue {
    pub date: String,
    pub value: f64,
}

/// A past value for multi-visit trend lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalValue {
    pub date: String,
    pub raw: ResultValue,
    pub value: Option<f64>,
    pub unit: String,
}

/// Change against a previous value. `percent` is omitted when the previous
/// value is zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    pub delta: f64,
    pub percent: Option<f64>,
}

impl Delta {
    pub fn between(current: f64, previous: f64) -> Self {
        let delta = current - previous;
        let percent = if previous != 0.0 {
            Some(delta * 100.0 / previous)
        } else {
            None
        };
        Self { delta, percent }
    }
}

/// Everything the viewer needs to render a trend for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    pub previous: Option<PreviousValue>,
    pub delta: Option<Delta>,
    pub history: Vec<HistoricalValue>,
}

/// Find the latest numeric value before `current_date` whose unit matches the
/// item's unit (units are only compared when both are set).
pub fn find_previous_value(
    item: &ReportItem,
    current_date: &str,
    history: &HistoryIndex,
) -> Option<PreviousValue> {
    history.older_than(current_date).find_map(|date| {
        let entry = history.entry(date, &item.key)?;
        let value = entry.raw.as_number()?;
        if !units_match(&item.unit, &entry.unit) {
            return None;
        }
        Some(PreviousValue {
            date: date.clone(),
            value,
        })
    })
}

/// Collect up to `max_count` earlier values, newest first, regardless of unit.
/// Remarks-like items have no history.
pub fn find_previous_values(
    item: &ReportItem,
    current_date: &str,
    history: &HistoryIndex,
    max_count: usize,
) -> Vec<HistoricalValue> {
    if is_remarks_like(&item.key, &item.label) {
        return Vec::new();
    }

    history
        .older_than(current_date)
        .filter_map(|date| {
            history.entry(date, &item.key).map(|entry| HistoricalValue {
                date: date.clone(),
                raw: entry.raw.clone(),
                value: entry.raw.as_number(),
                unit: entry.unit.clone(),
            })
        })
        .take(max_count)
        .collect()
}

/// Previous value, delta and trend list for one item.
pub fn trend_for(
    item: &ReportItem,
    current_date: &str,
    history: &HistoryIndex,
    max_count: usize,
) -> Trend {
    let previous = find_previous_value(item, current_date, history);
    let delta = match (item.value.as_number(), &previous) {
        (Some(current), Some(prev)) => Some(Delta::between(current, prev.value)),
        _ => None,
    };
    Trend {
        previous,
        delta,
        history: find_previous_values(item, current_date, history, max_count),
    }
}

/// Check whether an item is a free-text remarks/notes field.
pub fn is_remarks_like(key: &str, label: &str) -> bool {
    let key = key.trim().to_lowercase();
    if key == "remarks" || key.ends_with("_remarks") || key.ends_with("_remark") {
        return true;
    }

    let normalized: String = label
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    REMARKS_LABELS.contains(&normalized.as_str())
}

fn units_match(current: &str, previous: &str) -> bool {
    let (current, previous) = (current.trim(), previous.trim());
    current.is_empty() || previous.is_empty() || current.eq_ignore_ascii_case(previous)
}
