//! Lab result database operations.

use rusqlite::{params, params_from_iter};

use super::{Database, DbError, DbResult};
use crate::expand::is_excluded_column;
use crate::models::{CellValue, FieldMap, NewLabResult};
use crate::normalize::escape_exact_pattern;
use crate::source::ResultSource;

const WIDE_TABLE: &str = "lab_results_wide";

impl Database {
    /// Insert a row-per-analyte result.
    pub fn insert_lab_result(&self, result: &NewLabResult) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO lab_results (
                id, patient_id, date_of_test, analyte_key, value, unit,
                reference_low, reference_high, flag, method, remarks,
                barcode, notes, branch, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
            "#,
            params![
                result.id,
                result.patient_id,
                result.visit_date,
                result.analyte_key,
                result.value,
                result.unit,
                result.reference_low,
                result.reference_high,
                result.flag,
                result.method,
                result.remarks,
                result.barcode,
                result.notes,
                result.branch,
                result.created_by,
                result.created_at,
            ],
        )?;
        Ok(())
    }

    /// Delete a row-per-analyte result.
    pub fn delete_lab_result(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM lab_results WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Insert or replace a legacy row-per-visit record.
    ///
    /// `patient_id` and `date_of_test` are required; every other column must
    /// already exist in the wide table.
    pub fn upsert_wide_result(&self, record: &FieldMap) -> DbResult<()> {
        for required in ["patient_id", "date_of_test"] {
            if record.first_text(&[required]).is_none() {
                return Err(DbError::Constraint(format!(
                    "wide record is missing {}",
                    required
                )));
            }
        }

        let known = self.wide_columns()?;
        let mut columns = Vec::with_capacity(record.len());
        let mut values: Vec<&CellValue> = Vec::with_capacity(record.len());
        for (column, value) in record.iter() {
            if !known.iter().any(|k| k == column) {
                return Err(DbError::Constraint(format!(
                    "unknown wide column: {}",
                    column
                )));
            }
            columns.push(format!("\"{}\"", column));
            values.push(value);
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let mut updates: Vec<String> = columns
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        if record.get("updated_at").is_none() {
            updates.push("updated_at = datetime('now')".to_string());
        }

        let sql = format!(
            "INSERT INTO {table} ({cols}) VALUES ({vals}) \
             ON CONFLICT(patient_id, date_of_test) DO UPDATE SET {updates}",
            table = WIDE_TABLE,
            cols = columns.join(", "),
            vals = placeholders.join(", "),
            updates = updates.join(", "),
        );

        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Add an analyte column to the wide table.
    pub fn add_wide_column(&self, analyte_key: &str) -> DbResult<()> {
        if !is_valid_column_name(analyte_key) || is_excluded_column(analyte_key) {
            return Err(DbError::Constraint(format!(
                "invalid analyte column: {}",
                analyte_key
            )));
        }
        if self.wide_columns()?.iter().any(|c| c == analyte_key) {
            return Ok(());
        }
        self.conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN \"{}\"",
            WIDE_TABLE, analyte_key
        ))?;
        tracing::info!(column = analyte_key, "Added analyte column to wide table");
        Ok(())
    }

    /// Column names of the wide table.
    pub fn wide_columns(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([WIDE_TABLE], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Row-per-analyte records of a patient (case-insensitive exact match).
    pub fn query_flat_results(
        &self,
        patient_id: &str,
        visit_date: Option<&str>,
    ) -> DbResult<Vec<FieldMap>> {
        self.query_records(
            r#"
            SELECT * FROM lab_results
            WHERE patient_id LIKE ?1 ESCAPE '\'
              AND (?2 IS NULL OR date_of_test = ?2)
            ORDER BY date_of_test DESC, created_at, id
            "#,
            params![escape_exact_pattern(patient_id.trim()), visit_date],
        )
    }

    /// Row-per-visit records of a patient (case-insensitive exact match).
    pub fn query_wide_results(
        &self,
        patient_id: &str,
        visit_date: Option<&str>,
    ) -> DbResult<Vec<FieldMap>> {
        self.query_records(
            r#"
            SELECT * FROM lab_results_wide
            WHERE patient_id LIKE ?1 ESCAPE '\'
              AND (?2 IS NULL OR date_of_test = ?2)
            ORDER BY date_of_test DESC, id
            "#,
            params![escape_exact_pattern(patient_id.trim()), visit_date],
        )
    }
}

impl ResultSource for Database {
    fn flat_results(&self, patient_id: &str, visit_date: Option<&str>) -> DbResult<Vec<FieldMap>> {
        self.query_flat_results(patient_id, visit_date)
    }

    fn wide_results(&self, patient_id: &str, visit_date: Option<&str>) -> DbResult<Vec<FieldMap>> {
        self.query_wide_results(patient_id, visit_date)
    }

    fn reference_ranges(&self) -> DbResult<Vec<FieldMap>> {
        self.query_reference_ranges()
    }
}

/// Lowercase ASCII identifier: letters, digits and underscores, not starting
/// with a digit.
fn is_valid_column_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
