//! SQLite schema definition.

/// Complete database schema for labsheet.
///
/// Value and bound columns are declared without a type so SQLite keeps
/// numbers and text exactly as they were written.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Lab Results (row per analyte)
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_results (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    date_of_test TEXT NOT NULL,
    analyte_key TEXT NOT NULL,
    value,                                       -- number or text as entered
    unit TEXT,
    reference_low,
    reference_high,
    flag TEXT,                                   -- L, H, A or NULL
    method TEXT,
    remarks TEXT,
    barcode TEXT,
    notes TEXT,
    branch TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_lab_results_patient ON lab_results(patient_id, date_of_test);
CREATE INDEX IF NOT EXISTS idx_lab_results_key ON lab_results(analyte_key);

-- ============================================================================
-- Legacy Lab Results (row per visit, column per analyte)
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_results_wide (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL,
    date_of_test TEXT NOT NULL,
    barcode TEXT,
    notes TEXT,
    branch TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    created_by TEXT,
    updated_by TEXT,
    created_by_initials TEXT,

    -- Hematology
    hema_wbc, hema_rbc, hema_hgb, hema_hct, hema_plt,
    hema_neutrophils, hema_lymphocytes, hema_monocytes, hema_eosinophils,
    hema_basophils, hema_blood_type, hema_remarks,

    -- Blood Chemistry
    chem_fbs, chem_rbs, chem_bun, chem_creatinine, chem_bua,
    chem_cholesterol, chem_triglycerides, chem_hdl, chem_ldl,
    chem_ast, chem_alt, chem_remarks,

    -- Urinalysis
    ua_color, ua_transparency, ua_ph, ua_specific_gravity, ua_protein,
    ua_glucose, ua_pus_cells, ua_rbc, ua_remarks,

    -- Fecalysis
    fa_color, fa_consistency, fa_pus_cells, fa_rbc, fa_parasites, fa_remarks,

    -- Serology
    sero_hbsag, sero_hiv, sero_vdrl, sero_pregnancy_test, sero_remarks,

    UNIQUE (patient_id, date_of_test)
);

CREATE INDEX IF NOT EXISTS idx_lab_results_wide_patient ON lab_results_wide(patient_id, date_of_test);

-- ============================================================================
-- Reference Ranges
-- ============================================================================

CREATE TABLE IF NOT EXISTS reference_ranges (
    analyte_key TEXT PRIMARY KEY,
    section TEXT,
    label TEXT,
    unit TEXT,
    low,
    high,
    sort_order REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
