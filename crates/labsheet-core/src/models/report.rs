//! Display-ready report models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Visit;

/// Abnormal flag on a report item. There is no "normal" flag: an in-range
/// item simply has none.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Flag {
    #[serde(rename = "L")]
    Low,
    #[serde(rename = "H")]
    High,
    #[serde(rename = "A")]
    Abnormal,
}

impl Flag {
    /// Parse a stored flag, case-insensitively. Anything else (including
    /// "N"/"normal") yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "l" | "low" => Some(Flag::Low),
            "h" | "high" => Some(Flag::High),
            "a" | "abnormal" => Some(Flag::Abnormal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Low => "L",
            Flag::High => "H",
            Flag::Abnormal => "A",
        }
    }
}

/// A normalized value: a number when it parses as one, the original text
/// otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
}

impl ResultValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResultValue::Number(n) => Some(*n),
            ResultValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number(n) => write!(f, "{}", n),
            ResultValue::Text(s) => f.write_str(s),
        }
    }
}

/// One line of a lab report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportItem {
    /// Analyte key
    pub key: String,
    /// Display label
    pub label: String,
    /// Display unit, empty when unknown
    pub unit: String,
    pub value: ResultValue,
    /// Lower reference bound as stored
    pub reference_low: Option<ResultValue>,
    /// Upper reference bound as stored
    pub reference_high: Option<ResultValue>,
    pub flag: Option<Flag>,
    pub method: Option<String>,
    pub remarks: Option<String>,
}

impl ReportItem {
    /// Reference range for display: "70 - 100", "< 100" or "> 70".
    pub fn reference_display(&self) -> Option<String> {
        match (&self.reference_low, &self.reference_high) {
            (Some(low), Some(high)) => Some(format!("{} - {}", low, high)),
            (None, Some(high)) => Some(format!("< {}", high)),
            (Some(low), None) => Some(format!("> {}", low)),
            (None, None) => None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.flag.is_some()
    }
}

/// A named group of report items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSection {
    pub name: String,
    pub items: Vec<ReportItem>,
}

impl ReportSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn item(&self, key: &str) -> Option<&ReportItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

/// The consolidated lab report of one patient visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    /// Patient identifier as requested
    pub patient_id: String,
    pub visit: Visit,
    /// Non-empty sections in display order
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn section(&self, name: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Find an item in any section.
    pub fn item(&self, key: &str) -> Option<&ReportItem> {
        self.sections.iter().find_map(|s| s.item(key))
    }

    /// Iterate all items in display order.
    pub fn items(&self) -> impl Iterator<Item = &ReportItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Count of items carrying a flag.
    pub fn flagged_count(&self) -> usize {
        self.items().filter(|item| item.is_flagged()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
