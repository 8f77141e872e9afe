//! Section and item ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{RangeMetadata, ReportItem, ReportSection};
use crate::ranges::{RangeTable, BLOOD_CHEMISTRY, FECALYSIS, HEMATOLOGY, OTHERS, SEROLOGY, URINALYSIS};

/// Display order of the known sections. Unknown sections follow
/// alphabetically, "Others" always last.
pub const SECTION_ORDER: &[&str] = &[HEMATOLOGY, BLOOD_CHEMISTRY, URINALYSIS, FECALYSIS, SEROLOGY];

const HEMATOLOGY_ORDER: &[&str] = &[
    "hema_wbc",
    "hema_rbc",
    "hema_hgb",
    "hema_hct",
    "hema_mcv",
    "hema_mch",
    "hema_mchc",
    "hema_rdw",
    "hema_plt",
    "hema_neutrophils",
    "hema_lymphocytes",
    "hema_monocytes",
    "hema_eosinophils",
    "hema_basophils",
    "hema_bands",
    "hema_esr",
    "hema_bleeding_time",
    "hema_clotting_time",
    "hema_blood_type",
    "hema_remarks",
];

const BLOOD_CHEMISTRY_ORDER: &[&str] = &[
    "chem_fbs",
    "chem_rbs",
    "chem_hba1c",
    "chem_bun",
    "chem_creatinine",
    "chem_bua",
    "chem_cholesterol",
    "chem_triglycerides",
    "chem_hdl",
    "chem_ldl",
    "chem_vldl",
    "chem_ast",
    "chem_alt",
    "chem_alp",
    "chem_total_bilirubin",
    "chem_direct_bilirubin",
    "chem_indirect_bilirubin",
    "chem_total_protein",
    "chem_albumin",
    "chem_globulin",
    "chem_sodium",
    "chem_potassium",
    "chem_chloride",
    "chem_calcium",
    "chem_remarks",
];

const URINALYSIS_ORDER: &[&str] = &[
    "ua_color",
    "ua_transparency",
    "ua_ph",
    "ua_specific_gravity",
    "ua_protein",
    "ua_glucose",
    "ua_ketones",
    "ua_bilirubin",
    "ua_urobilinogen",
    "ua_nitrite",
    "ua_leukocytes",
    "ua_blood",
    "ua_pus_cells",
    "ua_rbc",
    "ua_epithelial_cells",
    "ua_mucus_threads",
    "ua_bacteria",
    "ua_amorphous_urates",
    "ua_amorphous_phosphates",
    "ua_casts",
    "ua_crystals",
    "ua_remarks",
];

const FECALYSIS_ORDER: &[&str] = &[
    "fa_color",
    "fa_consistency",
    "fa_mucus",
    "fa_blood",
    "fa_pus_cells",
    "fa_rbc",
    "fa_fat_globules",
    "fa_yeast_cells",
    "fa_bacteria",
    "fa_parasites",
    "fa_occult_blood",
    "fa_remarks",
];

const SEROLOGY_ORDER: &[&str] = &[
    "sero_hbsag",
    "sero_anti_hbs",
    "sero_anti_hcv",
    "sero_hiv",
    "sero_vdrl",
    "sero_rpr",
    "sero_dengue_ns1",
    "sero_dengue_igg",
    "sero_dengue_igm",
    "sero_typhidot",
    "sero_pregnancy_test",
    "sero_blood_type",
    "sero_remarks",
];

/// Default item order for a section, if it has one.
pub fn default_order(section: &str) -> Option<&'static [&'static str]> {
    match section {
        HEMATOLOGY => Some(HEMATOLOGY_ORDER),
        BLOOD_CHEMISTRY => Some(BLOOD_CHEMISTRY_ORDER),
        URINALYSIS => Some(URINALYSIS_ORDER),
        FECALYSIS => Some(FECALYSIS_ORDER),
        SEROLOGY => Some(SEROLOGY_ORDER),
        _ => None,
    }
}

/// Explicit order ranks taken from range metadata.
#[derive(Debug, Clone, Default)]
pub struct OrderIndex {
    ranks: HashMap<String, f64>,
}

impl OrderIndex {
    pub fn from_ranges(rows: &[RangeMetadata]) -> Self {
        let ranks = rows
            .iter()
            .filter_map(|meta| meta.order.map(|rank| (meta.analyte_key.clone(), rank)))
            .collect();
        Self { ranks }
    }

    pub fn rank(&self, key: &str) -> Option<f64> {
        self.ranks.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Order items within every section and the sections themselves.
/// Sections without items are dropped.
pub fn sort_sections(sections: Vec<ReportSection>, ranges: &RangeTable) -> Vec<ReportSection> {
    let index = OrderIndex::from_ranges(ranges.rows());

    let mut sections: Vec<ReportSection> = sections
        .into_iter()
        .filter(|section| !section.items.is_empty())
        .map(|mut section| {
            let defaults = default_order(&section.name);
            section
                .items
                .sort_by(|a, b| compare_items(a, b, &index, defaults));
            section
        })
        .collect();

    sections.sort_by(|a, b| compare_sections(&a.name, &b.name));
    sections
}

/// Total order on items: explicit rank, then the section default list, then
/// label and key. Missing ranks and unlisted keys sort last.
pub fn compare_items(
    a: &ReportItem,
    b: &ReportItem,
    index: &OrderIndex,
    defaults: Option<&[&str]>,
) -> Ordering {
    let (rank_a, rank_b) = (index.rank(&a.key), index.rank(&b.key));

    let primary = if rank_a.is_some() || rank_b.is_some() {
        rank_cmp(rank_a, rank_b)
    } else if let Some(list) = defaults {
        rank_cmp(list_position(list, &a.key), list_position(list, &b.key))
    } else {
        Ordering::Equal
    };

    primary.then_with(|| alphabetical(a, b))
}

/// Section display order.
pub fn compare_sections(a: &str, b: &str) -> Ordering {
    section_bucket(a)
        .cmp(&section_bucket(b))
        .then_with(|| a.cmp(b))
}

fn section_bucket(name: &str) -> (u8, usize) {
    if let Some(pos) = SECTION_ORDER.iter().position(|s| *s == name) {
        (0, pos)
    } else if name == OTHERS {
        (2, 0)
    } else {
        (1, 0)
    }
}

fn list_position(list: &[&str], key: &str) -> Option<f64> {
    let lower = key.to_lowercase();
    list.iter().position(|k| *k == lower).map(|pos| pos as f64)
}

fn rank_cmp(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn alphabetical(a: &ReportItem, b: &ReportItem) -> Ordering {
    a.label
        .to_lowercase()
        .cmp(&b.label.to_lowercase())
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.key.cmp(&b.key))
}
