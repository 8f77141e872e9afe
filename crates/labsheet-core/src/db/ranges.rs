//! Reference range database operations.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::{FieldMap, RangeMetadata};

impl Database {
    /// Insert or update a reference range.
    pub fn upsert_reference_range(&self, range: &RangeMetadata) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO reference_ranges (
                analyte_key, section, label, unit, low, high, sort_order, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
            ON CONFLICT(analyte_key) DO UPDATE SET
                section = excluded.section,
                label = excluded.label,
                unit = excluded.unit,
                low = excluded.low,
                high = excluded.high,
                sort_order = excluded.sort_order,
                updated_at = datetime('now')
            "#,
            params![
                range.analyte_key,
                range.section,
                range.label,
                range.unit,
                range.low,
                range.high,
                range.order,
            ],
        )?;
        Ok(())
    }

    /// Get the reference range of one analyte.
    pub fn get_reference_range(&self, analyte_key: &str) -> DbResult<Option<RangeMetadata>> {
        let records = self.query_records(
            "SELECT * FROM reference_ranges WHERE analyte_key = ?",
            [analyte_key],
        )?;
        Ok(records.iter().find_map(RangeMetadata::from_fields))
    }

    /// All reference-range records.
    pub fn query_reference_ranges(&self) -> DbResult<Vec<FieldMap>> {
        self.query_records("SELECT * FROM reference_ranges ORDER BY analyte_key", [])
    }

    /// All reference ranges as typed metadata.
    pub fn list_reference_ranges(&self) -> DbResult<Vec<RangeMetadata>> {
        Ok(self
            .query_reference_ranges()?
            .iter()
            .filter_map(RangeMetadata::from_fields)
            .collect())
    }

    /// Delete a reference range.
    pub fn delete_reference_range(&self, analyte_key: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM reference_ranges WHERE analyte_key = ?",
            [analyte_key],
        )?;
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn fbs_range() -> RangeMetadata {
        RangeMetadata {
            section: Some("Blood Chemistry".into()),
            label: Some("FBS".into()),
            unit: Some("mg/dL".into()),
            order: Some(1.0),
            ..RangeMetadata::new("chem_fbs").with_bounds(70.0, 100.0)
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();
        db.upsert_reference_range(&fbs_range()).unwrap();

        let retrieved = db.get_reference_range("chem_fbs").unwrap().unwrap();
        assert_eq!(retrieved, fbs_range());
        assert!(db.get_reference_range("CHEM_FBS").unwrap().is_none());
    }

    #[test]
    fn test_upsert_updates() {
        let db = setup_db();
        db.upsert_reference_range(&fbs_range()).unwrap();

        let mut updated = fbs_range();
        updated.high = CellValue::text("110");
        updated.order = None;
        db.upsert_reference_range(&updated).unwrap();

        let ranges = db.list_reference_ranges().unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].high, CellValue::text("110"));
        assert_eq!(ranges[0].order, None);
    }

    #[test]
    fn test_records_expose_order_column() {
        let db = setup_db();
        db.upsert_reference_range(&fbs_range()).unwrap();

        let records = db.query_reference_ranges().unwrap();
        assert_eq!(records[0].get("sort_order"), Some(&CellValue::Number(1.0)));
        assert_eq!(records[0].get("analyte_key"), Some(&CellValue::text("chem_fbs")));
    }

    #[test]
    fn test_delete() {
        let db = setup_db();
        db.upsert_reference_range(&fbs_range()).unwrap();
        assert!(db.delete_reference_range("chem_fbs").unwrap());
        assert!(db.list_reference_ranges().unwrap().is_empty());
    }
}
