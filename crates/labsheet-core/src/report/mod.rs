//! Report assembly and ordering.
//!
//! Pipeline: Raw Rows → Assembly (normalize, flag, group) → Ordering

mod assembler;
mod orderer;

pub use assembler::*;
pub use orderer::*;

use crate::models::{RawResultRow, ReportSection};
use crate::ranges::RangeTable;

/// Assemble and order the sections of one visit.
pub fn build_sections(rows: &[RawResultRow], ranges: &RangeTable) -> Vec<ReportSection> {
    sort_sections(assemble_report(rows, ranges), ranges)
}
