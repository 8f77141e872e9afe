//! Golden tests for report consolidation.
//!
//! These tests run the whole pipeline against an in-memory store.

use labsheet_core::models::{FieldMap, Flag, NewLabResult, RangeMetadata, ResultValue};
use labsheet_core::ranges::{BLOOD_CHEMISTRY, HEMATOLOGY, OTHERS, URINALYSIS};
use labsheet_core::{Database, RangeCache, ReportConsolidator};

fn chemistry_ranges(db: &Database) -> anyhow::Result<()> {
    db.upsert_reference_range(&RangeMetadata {
        section: Some(BLOOD_CHEMISTRY.into()),
        label: Some("FBS".into()),
        unit: Some("mg/dL".into()),
        ..RangeMetadata::new("chem_fbs").with_bounds(70.0, 100.0)
    })?;
    Ok(())
}

#[test]
fn test_satoh_visit() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    chemistry_ranges(&db)?;
    // Remarks first so the output order cannot come from input order.
    db.insert_lab_result(&NewLabResult::new(
        "SATOH010596",
        "2024-01-10",
        "chem_remarks",
        "stable",
    ))?;
    db.insert_lab_result(&NewLabResult::new("SATOH010596", "2024-01-10", "chem_fbs", "95"))?;

    let cache = RangeCache::new();
    let report = ReportConsolidator::new(&db, &cache)
        .build_report("SATOH010596", Some("2024-01-10"))?
        .expect("visit exists");

    assert_eq!(report.sections.len(), 1);
    let section = &report.sections[0];
    assert_eq!(section.name, BLOOD_CHEMISTRY);

    let keys: Vec<&str> = section.items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["chem_fbs", "chem_remarks"]);

    assert_eq!(section.items[0].value, ResultValue::Number(95.0));
    assert_eq!(section.items[0].flag, None);
    assert_eq!(section.items[1].value, ResultValue::Text("stable".into()));
    assert_eq!(section.items[1].unit, "");
    Ok(())
}

/// One analyte value and the flag expected for it.
struct GoldenCase {
    id: &'static str,
    value: &'static str,
    expected_flag: Option<Flag>,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "fbs-high",
            value: "130",
            expected_flag: Some(Flag::High),
        },
        GoldenCase {
            id: "fbs-low",
            value: "50",
            expected_flag: Some(Flag::Low),
        },
        GoldenCase {
            id: "fbs-normal",
            value: "85",
            expected_flag: None,
        },
        GoldenCase {
            id: "fbs-upper-bound",
            value: "100",
            expected_flag: None,
        },
        GoldenCase {
            id: "fbs-thousands-separator",
            value: "1,250.5",
            expected_flag: Some(Flag::High),
        },
        GoldenCase {
            id: "fbs-text",
            value: "hemolyzed",
            expected_flag: None,
        },
    ]
}

#[test]
fn test_golden_flags() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    chemistry_ranges(&db)?;
    let cache = RangeCache::new();
    let consolidator = ReportConsolidator::new(&db, &cache);

    for (i, case) in get_golden_cases().iter().enumerate() {
        let patient = format!("GOLD{}", i);
        db.insert_lab_result(&NewLabResult::new(&patient, "2024-01-10", "chem_fbs", case.value))?;

        let report = consolidator
            .build_report(&patient, None)?
            .expect("visit exists");
        let item = report.item("chem_fbs").expect("item present");
        assert_eq!(item.flag, case.expected_flag, "case {}", case.id);
    }
    Ok(())
}

#[test]
fn test_mixed_sections_in_display_order() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    chemistry_ranges(&db)?;

    for (key, value) in [
        ("ua_ph", "6.0"),
        ("ecg_rate", "72"),
        ("chem_fbs", "88"),
        ("hema_wbc", "7.1"),
        ("hema_rbc", "-"),
        ("sero_hbsag", "n/a"),
    ] {
        db.insert_lab_result(&NewLabResult::new("P1", "2024-01-10", key, value))?;
    }

    let cache = RangeCache::new();
    let report = ReportConsolidator::new(&db, &cache)
        .build_report("P1", None)?
        .expect("visit exists");

    let names: Vec<&str> = report.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![HEMATOLOGY, BLOOD_CHEMISTRY, URINALYSIS, OTHERS]);
    assert!(report.item("hema_rbc").is_none());
    assert!(report.item("sero_hbsag").is_none());
    Ok(())
}

#[test]
fn test_wide_visit_matches_flat_visit() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    chemistry_ranges(&db)?;

    db.insert_lab_result(&NewLabResult::new("FLAT", "2024-01-10", "chem_fbs", "130"))?;
    db.insert_lab_result(&NewLabResult::new("FLAT", "2024-01-10", "hema_wbc", "7.1"))?;
    db.upsert_wide_result(
        &FieldMap::new()
            .with("patient_id", "WIDE")
            .with("date_of_test", "2024-01-10")
            .with("chem_fbs", 130.0)
            .with("hema_wbc", "7.1")
            .with("hema_rbc", ""),
    )?;

    let cache = RangeCache::new();
    let consolidator = ReportConsolidator::new(&db, &cache);
    let flat = consolidator.build_report("FLAT", None)?.expect("flat visit");
    let wide = consolidator.build_report("WIDE", None)?.expect("wide visit");

    assert_eq!(flat.sections, wide.sections);
    Ok(())
}

#[test]
fn test_patient_ids_match_exactly() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    db.insert_lab_result(&NewLabResult::new("AB_1", "2024-01-10", "chem_fbs", "90"))?;
    db.insert_lab_result(&NewLabResult::new("ABX1", "2024-01-10", "chem_fbs", "91"))?;
    db.insert_lab_result(&NewLabResult::new("A\\B", "2024-01-10", "chem_fbs", "92"))?;

    let cache = RangeCache::new();
    let consolidator = ReportConsolidator::new(&db, &cache);

    let report = consolidator.build_report("ab_1", None)?.expect("visit exists");
    assert_eq!(report.item("chem_fbs").map(|i| &i.value), Some(&ResultValue::Number(90.0)));

    let report = consolidator.build_report("a\\b", None)?.expect("visit exists");
    assert_eq!(report.item("chem_fbs").map(|i| &i.value), Some(&ResultValue::Number(92.0)));

    assert!(consolidator.build_report("AB%", None)?.is_none());
    Ok(())
}

#[test]
fn test_report_json_export() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    chemistry_ranges(&db)?;
    db.insert_lab_result(&NewLabResult::new("P1", "2024-01-10", "chem_fbs", "130"))?;

    let cache = RangeCache::new();
    let report = ReportConsolidator::new(&db, &cache)
        .build_report("P1", None)?
        .expect("visit exists");

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    let item = &json["sections"][0]["items"][0];
    assert_eq!(item["key"], "chem_fbs");
    assert_eq!(item["flag"], "H");
    assert_eq!(item["value"], 130.0);
    Ok(())
}
