//! Long-form observations and category label parsing
//!
//! The raw table is wide: one row per province, one column per
//! `nilai.<JENIS>.<DAERAH>.<TAHUN>.<PERIODE>` label. Each label is parsed
//! strictly; anything that does not match fails the load.

use crate::errors::{CoreError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LABEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^nilai\.(\w+)\.(\w+)\.(\d+)\.(\w+)$").expect("label pattern is a valid regex")
});

/// Components of a wide-table column label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryLabel {
    pub jenis: String,
    pub daerah: String,
    pub tahun: i32,
    pub periode: String,
}

/// Parse `nilai.<JENIS>.<DAERAH>.<TAHUN>.<PERIODE>`.
///
/// The whole label must match; a year that does not fit in `i32` is
/// rejected the same way as a structural mismatch.
pub fn parse_label(label: &str) -> Result<CategoryLabel> {
    let malformed = || CoreError::MalformedLabel {
        label: label.to_string(),
    };

    let caps = LABEL_PATTERN.captures(label).ok_or_else(malformed)?;
    let tahun = caps[3].parse::<i32>().map_err(|_| malformed())?;

    Ok(CategoryLabel {
        jenis: caps[1].to_string(),
        daerah: caps[2].to_string(),
        tahun,
        periode: caps[4].to_string(),
    })
}

/// One (region, category type, area type, year, period) → value record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub provinsi: String,
    pub jenis: String,
    pub daerah: String,
    pub tahun: i32,
    pub periode: String,
    /// `None` when the source cell was empty or explicitly not-a-number
    pub nilai: Option<f64>,
}

impl Observation {
    pub fn new(provinsi: impl Into<String>, label: CategoryLabel, nilai: Option<f64>) -> Self {
        Self {
            provinsi: provinsi.into(),
            jenis: label.jenis,
            daerah: label.daerah,
            tahun: label.tahun,
            periode: label.periode,
            nilai,
        }
    }

    /// Reconstruct the wide-table label this observation came from
    pub fn category(&self) -> String {
        format!(
            "nilai.{}.{}.{}.{}",
            self.jenis, self.daerah, self.tahun, self.periode
        )
    }
}

/// Parse a raw value cell. Empty and NA-style markers are missing values.
pub fn parse_value(raw: &str) -> Option<std::result::Result<f64, std::num::ParseFloatError>> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed == "-"
    {
        return None;
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_nan() => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_label() {
        let label = parse_label("nilai.MAKANAN.PERKOTAAN.2015.MARET").unwrap();
        assert_eq!(label.jenis, "MAKANAN");
        assert_eq!(label.daerah, "PERKOTAAN");
        assert_eq!(label.tahun, 2015);
        assert_eq!(label.periode, "MARET");
    }

    #[test]
    fn rejects_unanchored_or_incomplete_labels() {
        for bad in [
            "nilai.MAKANAN.PERKOTAAN.2015",
            "xnilai.MAKANAN.PERKOTAAN.2015.MARET",
            "nilai.MAKANAN.PERKOTAAN.2015.MARET.extra",
            "nilai.MAKANAN.PERKOTAAN.20a5.MARET",
            "nilai..PERKOTAAN.2015.MARET",
            "provinsi",
        ] {
            match parse_label(bad) {
                Err(CoreError::MalformedLabel { label }) => assert_eq!(label, bad),
                other => panic!("expected MalformedLabel for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_year_overflow() {
        assert!(parse_label("nilai.TOTAL.PERDESAAN.99999999999.MARET").is_err());
    }

    #[test]
    fn category_round_trips_label() {
        let label = parse_label("nilai.TOTAL.PERDESAANPERKOTAAN.2020.SEPTEMBER").unwrap();
        let obs = Observation::new("ACEH", label, Some(1.0));
        assert_eq!(obs.category(), "nilai.TOTAL.PERDESAANPERKOTAAN.2020.SEPTEMBER");
    }

    #[test]
    fn parse_value_handles_missing_markers() {
        assert!(parse_value("").is_none());
        assert!(parse_value("  ").is_none());
        assert!(parse_value("NA").is_none());
        assert!(parse_value("NaN").is_none());
        assert!(parse_value("-").is_none());
        assert_eq!(parse_value(" 412345.5 ").unwrap().unwrap(), 412345.5);
        assert!(parse_value("abc").unwrap().is_err());
    }
}
