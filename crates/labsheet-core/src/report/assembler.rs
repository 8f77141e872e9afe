//! Report assembler: raw rows → sections of display-ready items.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{CellValue, Flag, RawResultRow, ReportItem, ReportSection, ResultValue};
use crate::normalize::{is_placeholder, to_number};
use crate::ranges::{prefix_to_section, RangeTable};

/// Group rows into sections.
///
/// Items with an absent or placeholder value are dropped, and so are
/// sections left without items. Within a section a repeated analyte key
/// keeps the item ranked highest by [`compare_duplicates`], so the result
/// does not depend on row order. Output order is by name only; see
/// [`super::sort_sections`] for display order.
pub fn assemble_report(rows: &[RawResultRow], ranges: &RangeTable) -> Vec<ReportSection> {
    let mut grouped: BTreeMap<String, BTreeMap<String, ReportItem>> = BTreeMap::new();

    for row in rows {
        if let Some((section, item)) = build_item(row, ranges) {
            let items = grouped.entry(section).or_default();
            let outranks = items
                .get(&item.key)
                .map_or(true, |kept| compare_duplicates(kept, &item).is_lt());
            if outranks {
                items.insert(item.key.clone(), item);
            }
        }
    }

    grouped
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(name, items)| ReportSection {
            name,
            items: items.into_values().collect(),
        })
        .collect()
}

/// Resolve one row into its section name and report item.
///
/// Returns `None` for keyless rows and rows without a usable value.
pub fn build_item(row: &RawResultRow, ranges: &RangeTable) -> Option<(String, ReportItem)> {
    let key = row
        .analyte_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())?;
    let value = normalize_value(&row.value)?;
    let meta = ranges.get(key);

    let label = row
        .label
        .clone()
        .or_else(|| meta.and_then(|m| m.label.clone()))
        .unwrap_or_else(|| key.to_string());
    let unit = row
        .unit
        .clone()
        .or_else(|| meta.and_then(|m| m.unit.clone()))
        .unwrap_or_default();
    let section = row
        .section
        .clone()
        .or_else(|| meta.and_then(|m| m.section.clone()))
        .unwrap_or_else(|| prefix_to_section(key).to_string());

    let low = first_bound(&row.reference_low, meta.map(|m| &m.low));
    let high = first_bound(&row.reference_high, meta.map(|m| &m.high));

    let flag = row.flag.as_deref().and_then(Flag::parse).or_else(|| {
        compute_flag(
            value.as_number(),
            low.and_then(to_number),
            high.and_then(to_number),
        )
    });

    let item = ReportItem {
        key: key.to_string(),
        label,
        unit,
        value,
        reference_low: low.and_then(display_value),
        reference_high: high.and_then(display_value),
        flag,
        method: row.method.clone(),
        remarks: row.remarks.clone(),
    };
    Some((section, item))
}

/// Total order between two items sharing an analyte key. Numbers outrank
/// text, larger values outrank smaller ones, and the remaining display
/// fields break ties.
pub fn compare_duplicates(a: &ReportItem, b: &ReportItem) -> Ordering {
    compare_values(&a.value, &b.value)
        .then_with(|| a.flag.map(|f| f.as_str()).cmp(&b.flag.map(|f| f.as_str())))
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.unit.cmp(&b.unit))
        .then_with(|| a.reference_display().cmp(&b.reference_display()))
        .then_with(|| a.method.cmp(&b.method))
        .then_with(|| a.remarks.cmp(&b.remarks))
}

fn compare_values(a: &ResultValue, b: &ResultValue) -> Ordering {
    match (a, b) {
        (ResultValue::Number(x), ResultValue::Number(y)) => x.total_cmp(y),
        (ResultValue::Number(_), ResultValue::Text(_)) => Ordering::Greater,
        (ResultValue::Text(_), ResultValue::Number(_)) => Ordering::Less,
        (ResultValue::Text(x), ResultValue::Text(y)) => x.cmp(y),
    }
}

/// Numeric when it parses, trimmed text when it is not a placeholder,
/// `None` otherwise.
pub fn normalize_value(raw: &CellValue) -> Option<ResultValue> {
    if let Some(n) = to_number(raw) {
        return Some(ResultValue::Number(n));
    }
    match raw {
        CellValue::Text(s) if !is_placeholder(raw) => Some(ResultValue::Text(s.trim().to_string())),
        _ => None,
    }
}

/// Range flag for a numeric value. In-range values, non-numeric values and
/// values without any numeric bound get no flag.
pub fn compute_flag(value: Option<f64>, low: Option<f64>, high: Option<f64>) -> Option<Flag> {
    let value = value?;
    match (low, high) {
        (Some(low), _) if value < low => Some(Flag::Low),
        (_, Some(high)) if value > high => Some(Flag::High),
        _ => None,
    }
}

fn first_bound<'a>(row: &'a CellValue, meta: Option<&'a CellValue>) -> Option<&'a CellValue> {
    if !is_placeholder(row) {
        return Some(row);
    }
    meta.filter(|cell| !is_placeholder(cell))
}

/// Bounds are shown as stored, without forcing a numeric parse.
fn display_value(cell: &CellValue) -> Option<ResultValue> {
    match cell {
        CellValue::Null => None,
        CellValue::Number(n) => Some(ResultValue::Number(*n)),
        CellValue::Text(s) => Some(ResultValue::Text(s.trim().to_string())),
    }
}
