//! Feature encoding contract
//!
//! Turns long-form observations into a numeric design matrix:
//! - `year_num`: years since the earliest year in the fitting data
//! - `periode_num`: 1 for the SEPTEMBER survey, 0 otherwise
//! - drop-first indicator columns for `jenis` and `daerah`, levels sorted
//!
//! The same encoder output is what the inference service expects, so the
//! feature names are checked against [`FeatureSchema`] whenever a model is
//! loaded.

use crate::errors::{CoreError, Result};
use crate::observation::Observation;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Period label that maps to `periode_num = 1`
pub const PERIOD_SENTINEL: &str = "SEPTEMBER";

/// Name of the regression target column
pub const TARGET_COLUMN: &str = "nilai";

/// Feature names required by the inference service, in order
pub const CANONICAL_FEATURES: [&str; 6] = [
    "year_num",
    "periode_num",
    "jenis_NONMAKANAN",
    "jenis_TOTAL",
    "daerah_PERDESAANPERKOTAAN",
    "daerah_PERKOTAAN",
];

/// Ordered feature-name schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Schema the deployed service is built around
    pub fn canonical() -> Self {
        Self::new(CANONICAL_FEATURES.iter().map(|s| s.to_string()).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Fail unless `actual` has exactly these names in exactly this order
    pub fn verify(&self, actual: &[String]) -> Result<()> {
        if self.names.as_slice() == actual {
            Ok(())
        } else {
            Err(CoreError::SchemaMismatch {
                expected: self.names.clone(),
                actual: actual.to_vec(),
            })
        }
    }
}

/// Encoder state learned from the fitting observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    min_year: i32,
    jenis_levels: Vec<String>,
    daerah_levels: Vec<String>,
}

impl FeatureEncoder {
    /// Learn the minimum year and the sorted category levels
    pub fn fit(observations: &[Observation]) -> Result<Self> {
        let min_year = observations
            .iter()
            .map(|obs| obs.tahun)
            .min()
            .ok_or_else(|| CoreError::EmptyDataset("no observations to fit encoder".into()))?;

        let jenis_levels: BTreeSet<&str> = observations.iter().map(|o| o.jenis.as_str()).collect();
        let daerah_levels: BTreeSet<&str> =
            observations.iter().map(|o| o.daerah.as_str()).collect();

        Ok(Self {
            min_year,
            jenis_levels: jenis_levels.into_iter().map(str::to_string).collect(),
            daerah_levels: daerah_levels.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn min_year(&self) -> i32 {
        self.min_year
    }

    /// Ordered output feature names. The first (baseline) level of each
    /// category gets no indicator column.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["year_num".to_string(), "periode_num".to_string()];
        names.extend(
            self.jenis_levels
                .iter()
                .skip(1)
                .map(|level| format!("jenis_{level}")),
        );
        names.extend(
            self.daerah_levels
                .iter()
                .skip(1)
                .map(|level| format!("daerah_{level}")),
        );
        names
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.feature_names())
    }

    /// Encode observations and impute missing values with column means.
    /// Observations older than the fitted `min_year` are rejected.
    pub fn transform(&self, observations: &[Observation]) -> Result<EncodedTable> {
        if observations.is_empty() {
            return Err(CoreError::EmptyDataset("no observations to encode".into()));
        }

        let feature_names = self.feature_names();
        let width = feature_names.len();
        let jenis_offset = 2;
        let daerah_offset = jenis_offset + self.jenis_levels.len().saturating_sub(1);

        let mut features = Array2::<f64>::zeros((observations.len(), width));
        let mut targets = Array1::<f64>::from_elem(observations.len(), f64::NAN);

        for (i, obs) in observations.iter().enumerate() {
            if obs.tahun < self.min_year {
                return Err(CoreError::InvalidValue {
                    row: i + 1,
                    column: "tahun".to_string(),
                    value: format!("{} (earliest fitted year is {})", obs.tahun, self.min_year),
                });
            }
            features[[i, 0]] = f64::from(obs.tahun - self.min_year);
            features[[i, 1]] = if obs.periode == PERIOD_SENTINEL { 1.0 } else { 0.0 };

            let jenis_idx = level_index(&self.jenis_levels, &obs.jenis, "jenis")?;
            if jenis_idx > 0 {
                features[[i, jenis_offset + jenis_idx - 1]] = 1.0;
            }

            let daerah_idx = level_index(&self.daerah_levels, &obs.daerah, "daerah")?;
            if daerah_idx > 0 {
                features[[i, daerah_offset + daerah_idx - 1]] = 1.0;
            }

            if let Some(value) = obs.nilai {
                targets[i] = value;
            }
        }

        let mut table = EncodedTable::new(feature_names, features, targets)?;
        let summary = table.impute_missing()?;

        info!(
            rows = table.n_rows(),
            features = ?table.feature_names(),
            "encoded observations"
        );
        debug!(
            feature_missing = ?summary.feature_missing,
            target_missing = summary.target_missing,
            "mean imputation applied"
        );

        Ok(table)
    }
}

fn level_index(levels: &[String], level: &str, field: &'static str) -> Result<usize> {
    levels
        .binary_search_by(|candidate| candidate.as_str().cmp(level))
        .map_err(|_| CoreError::UnknownCategory {
            field,
            level: level.to_string(),
        })
}

/// Fit an encoder on `observations` and encode them in one step
pub fn encode(observations: &[Observation]) -> Result<EncodedTable> {
    FeatureEncoder::fit(observations)?.transform(observations)
}

/// Counts of values replaced during mean imputation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImputationSummary {
    pub feature_missing: Vec<usize>,
    pub target_missing: usize,
}

impl ImputationSummary {
    pub fn total(&self) -> usize {
        self.feature_missing.iter().sum::<usize>() + self.target_missing
    }
}

/// Named design matrix with its target vector (`X`, `y`)
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    feature_names: Vec<String>,
    features: Array2<f64>,
    targets: Array1<f64>,
    /// Rows whose target was filled in by [`EncodedTable::impute_missing`]
    imputed_targets: Vec<bool>,
}

impl EncodedTable {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        targets: Array1<f64>,
    ) -> Result<Self> {
        if features.ncols() != feature_names.len() {
            return Err(CoreError::FeatureCountMismatch {
                expected: feature_names.len(),
                actual: features.ncols(),
            });
        }
        if features.nrows() != targets.len() {
            return Err(CoreError::InvalidParameters(format!(
                "feature rows ({}) and targets ({}) differ",
                features.nrows(),
                targets.len()
            )));
        }

        let imputed_targets = vec![false; targets.len()];
        Ok(Self {
            feature_names,
            features,
            targets,
            imputed_targets,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Values of one named feature column
    pub fn column(&self, name: &str) -> Option<Array1<f64>> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.features.column(idx).to_owned())
    }

    /// Copy of the table restricted to `indices`, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
            imputed_targets: indices.iter().map(|&i| self.imputed_targets[i]).collect(),
        }
    }

    /// Number of targets that hold an imputed mean rather than an observed value
    pub fn imputed_target_count(&self) -> usize {
        self.imputed_targets.iter().filter(|&&imputed| imputed).count()
    }

    /// Copy with imputed targets put back to NaN. Features stay imputed.
    pub fn with_observed_targets(&self) -> Self {
        let mut targets = self.targets.clone();
        for (target, &imputed) in targets.iter_mut().zip(&self.imputed_targets) {
            if imputed {
                *target = f64::NAN;
            }
        }

        Self {
            feature_names: self.feature_names.clone(),
            features: self.features.clone(),
            targets,
            imputed_targets: vec![false; self.imputed_targets.len()],
        }
    }

    /// Replace NaN cells with their column mean; fail if any NaN survives
    pub fn impute_missing(&mut self) -> Result<ImputationSummary> {
        let mut summary = ImputationSummary {
            feature_missing: vec![0; self.feature_names.len()],
            target_missing: 0,
        };

        for (idx, mut column) in self.features.axis_iter_mut(Axis(1)).enumerate() {
            summary.feature_missing[idx] = fill_with_mean(column.view_mut());
            if column.iter().any(|v| v.is_nan()) {
                return Err(CoreError::UnresolvedMissing {
                    column: self.feature_names[idx].clone(),
                });
            }
        }

        for (imputed, target) in self.imputed_targets.iter_mut().zip(self.targets.iter()) {
            *imputed |= target.is_nan();
        }
        summary.target_missing = fill_with_mean(self.targets.view_mut());
        if self.targets.iter().any(|v| v.is_nan()) {
            return Err(CoreError::UnresolvedMissing {
                column: TARGET_COLUMN.to_string(),
            });
        }

        Ok(summary)
    }

    /// Write the table as CSV: feature columns followed by the target
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;

        let mut header: Vec<&str> = self.feature_names.iter().map(String::as_str).collect();
        header.push(TARGET_COLUMN);
        writer.write_record(&header)?;

        for (row, target) in self.features.rows().into_iter().zip(self.targets.iter()) {
            let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            record.push(if target.is_nan() {
                String::new()
            } else {
                target.to_string()
            });
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Read a table written by [`EncodedTable::write_csv`]. Empty cells
    /// become NaN and are left for the caller to handle.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();

        let mut columns: Vec<String> = headers.iter().map(str::to_string).collect();
        if columns.last().map(String::as_str) != Some(TARGET_COLUMN) {
            return Err(CoreError::InvalidParameters(format!(
                "last column must be {TARGET_COLUMN:?}, got {:?}",
                columns.last()
            )));
        }
        columns.pop();

        let width = columns.len();
        let mut values = Vec::new();
        let mut targets = Vec::new();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            for (col_idx, cell) in record.iter().enumerate() {
                let column = headers.get(col_idx).unwrap_or_default();
                let value = match crate::observation::parse_value(cell) {
                    None => f64::NAN,
                    Some(Ok(v)) => v,
                    Some(Err(_)) => {
                        return Err(CoreError::InvalidValue {
                            row: row_idx + 1,
                            column: column.to_string(),
                            value: cell.to_string(),
                        })
                    }
                };
                if col_idx < width {
                    values.push(value);
                } else {
                    targets.push(value);
                }
            }
        }

        let rows = targets.len();
        let features = Array2::from_shape_vec((rows, width), values)
            .map_err(|err| CoreError::InvalidParameters(format!("ragged table: {err}")))?;

        Self::new(columns, features, Array1::from_vec(targets))
    }
}

fn fill_with_mean(mut column: ndarray::ArrayViewMut1<'_, f64>) -> usize {
    let (sum, count) = column
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    let missing = column.len() - count;

    if missing > 0 && count > 0 {
        let mean = sum / count as f64;
        column.iter_mut().filter(|v| v.is_nan()).for_each(|v| *v = mean);
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::parse_label;

    fn obs(jenis: &str, daerah: &str, tahun: i32, periode: &str, nilai: Option<f64>) -> Observation {
        let label = parse_label(&format!("nilai.{jenis}.{daerah}.{tahun}.{periode}")).unwrap();
        Observation::new("ACEH", label, nilai)
    }

    fn full_grid() -> Vec<Observation> {
        let mut out = Vec::new();
        for (j, jenis) in ["MAKANAN", "NONMAKANAN", "TOTAL"].iter().enumerate() {
            for (d, daerah) in ["PERKOTAAN", "PERDESAAN", "PERDESAANPERKOTAAN"]
                .iter()
                .enumerate()
            {
                for tahun in [2019, 2020] {
                    for periode in ["MARET", "SEPTEMBER"] {
                        let value = 300_000.0 + (j * 1000 + d * 100) as f64 + tahun as f64;
                        out.push(obs(jenis, daerah, tahun, periode, Some(value)));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn canonical_grid_produces_canonical_schema() {
        let table = encode(&full_grid()).unwrap();
        FeatureSchema::canonical()
            .verify(table.feature_names())
            .unwrap();
        assert_eq!(table.n_rows(), 36);
    }

    #[test]
    fn year_and_period_features() {
        let table = encode(&full_grid()).unwrap();
        let years = table.column("year_num").unwrap();
        let periods = table.column("periode_num").unwrap();

        assert_eq!(years.fold(f64::INFINITY, |a, &b| a.min(b)), 0.0);
        assert_eq!(years.fold(f64::NEG_INFINITY, |a, &b| a.max(b)), 1.0);
        assert!(periods.iter().all(|&p| p == 0.0 || p == 1.0));
    }

    #[test]
    fn period_sentinel_is_exact_match() {
        let data = vec![
            obs("TOTAL", "PERKOTAAN", 2020, "SEPTEMBER", Some(1.0)),
            obs("TOTAL", "PERKOTAAN", 2020, "September", Some(2.0)),
            obs("TOTAL", "PERKOTAAN", 2020, "MARET", Some(3.0)),
        ];
        let table = encode(&data).unwrap();
        let periods = table.column("periode_num").unwrap();
        assert_eq!(periods.to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn drop_first_uses_sorted_levels() {
        let data = vec![
            obs("TOTAL", "PERKOTAAN", 2020, "MARET", Some(1.0)),
            obs("MAKANAN", "PERDESAAN", 2020, "MARET", Some(2.0)),
        ];
        let encoder = FeatureEncoder::fit(&data).unwrap();
        assert_eq!(
            encoder.feature_names(),
            vec!["year_num", "periode_num", "jenis_TOTAL", "daerah_PERKOTAAN"]
        );
        let table = encoder.transform(&data).unwrap();
        assert_eq!(table.features().row(0).to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(table.features().row(1).to_vec(), vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_targets_are_mean_imputed() {
        let data = vec![
            obs("TOTAL", "PERKOTAAN", 2020, "MARET", Some(100.0)),
            obs("TOTAL", "PERKOTAAN", 2021, "MARET", None),
            obs("TOTAL", "PERKOTAAN", 2022, "MARET", Some(300.0)),
        ];
        let table = encode(&data).unwrap();
        assert_eq!(table.targets().to_vec(), vec![100.0, 200.0, 300.0]);
        assert_eq!(table.imputed_target_count(), 1);
    }

    #[test]
    fn observed_targets_restore_nan_for_imputed_rows() {
        let data = vec![
            obs("TOTAL", "PERKOTAAN", 2020, "MARET", Some(100.0)),
            obs("TOTAL", "PERKOTAAN", 2021, "MARET", None),
            obs("TOTAL", "PERKOTAAN", 2022, "MARET", Some(300.0)),
            obs("TOTAL", "PERKOTAAN", 2023, "MARET", None),
        ];
        let table = encode(&data).unwrap();

        let subset = table.select_rows(&[3, 0]);
        assert_eq!(subset.imputed_target_count(), 1);

        let observed = subset.with_observed_targets();
        assert!(observed.targets()[0].is_nan());
        assert_eq!(observed.targets()[1], 100.0);
        assert_eq!(observed.features(), subset.features());
        assert_eq!(observed.imputed_target_count(), 0);
    }

    #[test]
    fn year_before_fitted_minimum_fails_transform() {
        let encoder = FeatureEncoder::fit(&full_grid()).unwrap();
        let older = vec![obs("TOTAL", "PERKOTAAN", 2018, "MARET", Some(1.0))];
        match encoder.transform(&older) {
            Err(CoreError::InvalidValue { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "tahun");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn all_missing_target_fails() {
        let data = vec![
            obs("TOTAL", "PERKOTAAN", 2020, "MARET", None),
            obs("TOTAL", "PERKOTAAN", 2021, "MARET", None),
        ];
        match encode(&data) {
            Err(CoreError::UnresolvedMissing { column }) => assert_eq!(column, TARGET_COLUMN),
            other => panic!("expected UnresolvedMissing, got {other:?}"),
        }
    }

    #[test]
    fn unknown_level_fails_transform() {
        let encoder = FeatureEncoder::fit(&full_grid()).unwrap();
        let unseen = vec![obs("LAINNYA", "PERKOTAAN", 2020, "MARET", Some(1.0))];
        assert!(matches!(
            encoder.transform(&unseen),
            Err(CoreError::UnknownCategory { field: "jenis", .. })
        ));
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(encode(&[]), Err(CoreError::EmptyDataset(_))));
    }

    #[test]
    fn schema_verify_reports_both_sides() {
        let schema = FeatureSchema::canonical();
        let drifted: Vec<String> = vec!["year_num".into(), "periode_num".into()];
        match schema.verify(&drifted) {
            Err(CoreError::SchemaMismatch { expected, actual }) => {
                assert_eq!(expected.len(), 6);
                assert_eq!(actual, drifted);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn csv_round_trip_keeps_values_and_missing_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdout.csv");

        let features = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, 0.0]).unwrap();
        let targets = Array1::from_vec(vec![412_345.25, f64::NAN]);
        let table = EncodedTable::new(
            vec!["year_num".into(), "periode_num".into()],
            features,
            targets,
        )
        .unwrap();

        table.write_csv(&path).unwrap();
        let loaded = EncodedTable::read_csv(&path).unwrap();

        assert_eq!(loaded.feature_names(), table.feature_names());
        assert_eq!(loaded.features(), table.features());
        assert_eq!(loaded.targets()[0], 412_345.25);
        assert!(loaded.targets()[1].is_nan());
    }
}
