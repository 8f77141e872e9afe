//! Reference range resolver.
//!
//! The range table is fetched once and shared for the life of the cache.
//! There is no TTL and no refresh.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::db::DbResult;
use crate::models::{FieldMap, RangeMetadata};
use crate::source::ResultSource;

pub const HEMATOLOGY: &str = "Hematology";
pub const BLOOD_CHEMISTRY: &str = "Blood Chemistry";
pub const URINALYSIS: &str = "Urinalysis";
pub const FECALYSIS: &str = "Fecalysis";
pub const SEROLOGY: &str = "Serology";
pub const OTHERS: &str = "Others";

/// Key prefix → section, matched case-insensitively.
const SECTION_PREFIXES: &[(&str, &str)] = &[
    ("hema_", HEMATOLOGY),
    ("chem_", BLOOD_CHEMISTRY),
    ("fa_", FECALYSIS),
    ("ua_", URINALYSIS),
    ("sero_", SEROLOGY),
];

/// Infer a section from an analyte key prefix.
pub fn prefix_to_section(key: &str) -> &'static str {
    let lower = key.trim().to_lowercase();
    SECTION_PREFIXES
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(_, section)| *section)
        .unwrap_or(OTHERS)
}

/// Reference ranges keyed by exact analyte key.
#[derive(Debug, Clone, Default)]
pub struct RangeTable {
    entries: HashMap<String, RangeMetadata>,
    rows: Vec<RangeMetadata>,
}

impl RangeTable {
    /// Build from typed metadata. A missing section is filled from the key
    /// prefix; for a repeated key the last row wins.
    pub fn from_metadata(rows: Vec<RangeMetadata>) -> Self {
        let rows: Vec<RangeMetadata> = rows
            .into_iter()
            .map(|mut meta| {
                if meta.section.is_none() {
                    meta.section = Some(prefix_to_section(&meta.analyte_key).to_string());
                }
                meta
            })
            .collect();

        let entries = rows
            .iter()
            .map(|meta| (meta.analyte_key.clone(), meta.clone()))
            .collect();

        Self { entries, rows }
    }

    /// Build from raw reference-range records, skipping keyless ones.
    pub fn from_records(records: &[FieldMap]) -> Self {
        Self::from_metadata(
            records
                .iter()
                .filter_map(RangeMetadata::from_fields)
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&RangeMetadata> {
        self.entries.get(key)
    }

    /// All loaded rows in source order.
    pub fn rows(&self) -> &[RangeMetadata] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetch and build the range table, bypassing any cache.
pub fn load_ranges<S: ResultSource + ?Sized>(source: &S) -> DbResult<RangeTable> {
    let records = source.reference_ranges()?;
    let table = RangeTable::from_records(&records);
    tracing::info!(
        records = records.len(),
        count = table.len(),
        "Loaded reference ranges"
    );
    Ok(table)
}

/// Load-once cache for the range table.
///
/// Read-only after the first successful load. Two callers racing on the
/// first load may both fetch; the first one to store wins. A failed fetch
/// caches nothing.
#[derive(Debug, Default)]
pub struct RangeCache {
    table: RwLock<Option<Arc<RangeTable>>>,
}

impl RangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached table, if loaded.
    pub fn cached(&self) -> Option<Arc<RangeTable>> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }

    /// Return the cached table, fetching it from `source` on first use.
    pub fn get_or_load<S: ResultSource + ?Sized>(&self, source: &S) -> DbResult<Arc<RangeTable>> {
        if let Some(table) = self.cached() {
            tracing::debug!(count = table.len(), "Reference ranges served from cache");
            return Ok(table);
        }

        let loaded = Arc::new(load_ranges(source)?);

        let mut slot = self.table.write().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.get_or_insert(loaded).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::models::CellValue;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_prefix_to_section() {
        assert_eq!(prefix_to_section("hema_wbc"), HEMATOLOGY);
        assert_eq!(prefix_to_section("CHEM_FBS"), BLOOD_CHEMISTRY);
        assert_eq!(prefix_to_section("fa_color"), FECALYSIS);
        assert_eq!(prefix_to_section("ua_ph"), URINALYSIS);
        assert_eq!(prefix_to_section("Sero_HBsAg"), SEROLOGY);
        assert_eq!(prefix_to_section("ecg_rate"), OTHERS);
        assert_eq!(prefix_to_section("hema"), OTHERS);
        assert_eq!(prefix_to_section(""), OTHERS);
    }

    #[test]
    fn test_table_defaults_section_from_prefix() {
        let table = RangeTable::from_metadata(vec![
            RangeMetadata::new("chem_fbs").with_bounds(70.0, 100.0),
            RangeMetadata {
                section: Some("Special".into()),
                ..RangeMetadata::new("chem_hba1c")
            },
        ]);

        assert_eq!(
            table.get("chem_fbs").unwrap().section.as_deref(),
            Some(BLOOD_CHEMISTRY)
        );
        assert_eq!(
            table.get("chem_hba1c").unwrap().section.as_deref(),
            Some("Special")
        );
        assert_eq!(table.get("chem_fbs").unwrap().low, CellValue::Number(70.0));
    }

    #[test]
    fn test_table_keys_are_case_sensitive() {
        let table = RangeTable::from_metadata(vec![RangeMetadata::new("chem_fbs")]);
        assert!(table.get("chem_fbs").is_some());
        assert!(table.get("CHEM_FBS").is_none());
    }

    #[test]
    fn test_table_from_records_skips_keyless() {
        let records = vec![
            FieldMap::new().with("analyte_key", "hema_wbc").with("label", "WBC"),
            FieldMap::new().with("label", "no key"),
        ];
        let table = RangeTable::from_records(&records);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows().len(), 1);
    }

    /// Range source that fails until told otherwise.
    struct FlakyRanges {
        fail: AtomicBool,
        fetches: AtomicUsize,
    }

    impl ResultSource for FlakyRanges {
        fn flat_results(&self, _: &str, _: Option<&str>) -> DbResult<Vec<FieldMap>> {
            Ok(Vec::new())
        }

        fn wide_results(&self, _: &str, _: Option<&str>) -> DbResult<Vec<FieldMap>> {
            Ok(Vec::new())
        }

        fn reference_ranges(&self) -> DbResult<Vec<FieldMap>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(DbError::Unavailable("ranges offline".into()));
            }
            Ok(vec![FieldMap::new()
                .with("analyte_key", "chem_fbs")
                .with("low", 70.0)
                .with("high", 100.0)])
        }
    }

    #[test]
    fn test_failed_load_caches_nothing() {
        let source = FlakyRanges {
            fail: AtomicBool::new(true),
            fetches: AtomicUsize::new(0),
        };
        let cache = RangeCache::new();

        let result = cache.get_or_load(&source);
        assert!(matches!(result, Err(DbError::Unavailable(_))));
        assert!(!cache.is_loaded());

        source.fail.store(false, Ordering::SeqCst);
        let table = cache.get_or_load(&source).unwrap();
        assert_eq!(table.len(), 1);
        assert!(cache.is_loaded());

        source.fail.store(true, Ordering::SeqCst);
        let cached = cache.get_or_load(&source).unwrap();
        assert!(Arc::ptr_eq(&table, &cached));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }
}
