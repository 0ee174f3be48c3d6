//! Wide-table CSV loading
//!
//! The source table has one row per province and one column per category
//! label. Loading melts it into long-form [`Observation`]s, row by row.

use gk_core::observation::parse_value;
use gk_core::{parse_label, CategoryLabel, CoreError, Observation};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::errors::{Result, TrainerError};

/// Name of the id column that must lead the wide table
pub const ID_COLUMN: &str = "provinsi";

/// Columns of the long-form table, in output order
pub const LONG_COLUMNS: [&str; 7] = [
    "provinsi", "category", "nilai", "jenis", "daerah", "tahun", "periode",
];

/// Long-form observations
#[derive(Clone, Debug)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Load and melt a wide CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        match headers.get(0) {
            Some(ID_COLUMN) => {}
            other => {
                return Err(TrainerError::MissingIdColumn {
                    found: other.map(str::to_string),
                })
            }
        }

        // Every value column must carry a well-formed label before any row is read
        let labels: Vec<(&str, CategoryLabel)> = headers
            .iter()
            .skip(1)
            .map(|h| parse_label(h).map(|label| (h, label)))
            .collect::<std::result::Result<_, _>>()?;

        if labels.is_empty() {
            return Err(TrainerError::Dataset("no value columns after provinsi".into()));
        }

        let mut observations = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let provinsi = record.get(0).unwrap_or_default();

            for (cell, (header, label)) in record.iter().skip(1).zip(&labels) {
                let nilai = match parse_value(cell) {
                    None => None,
                    Some(Ok(value)) => Some(value),
                    Some(Err(_)) => {
                        return Err(CoreError::InvalidValue {
                            row: row_idx + 1,
                            column: header.to_string(),
                            value: cell.to_string(),
                        }
                        .into())
                    }
                };
                observations.push(Observation::new(provinsi, label.clone(), nilai));
            }
        }

        if observations.is_empty() {
            return Err(TrainerError::Dataset("table has no data rows".into()));
        }

        let dataset = Self::new(observations);
        info!(
            rows = dataset.len(),
            columns = LONG_COLUMNS.len(),
            column_names = ?LONG_COLUMNS,
            missing = dataset.missing_count(),
            "loaded long-form dataset"
        );
        Ok(dataset)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    /// Get number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// (rows, columns) of the long-form table
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), LONG_COLUMNS.len())
    }

    pub fn missing_count(&self) -> usize {
        self.observations.iter().filter(|o| o.nilai.is_none()).count()
    }

    /// Persist the long table; missing values are written as empty cells
    pub fn write_long_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(LONG_COLUMNS)?;

        for obs in &self.observations {
            let nilai = obs.nilai.map(|v| v.to_string()).unwrap_or_default();
            writer.write_record([
                obs.provinsi.as_str(),
                obs.category().as_str(),
                nilai.as_str(),
                obs.jenis.as_str(),
                obs.daerah.as_str(),
                obs.tahun.to_string().as_str(),
                obs.periode.as_str(),
            ])?;
        }

        writer.flush()?;
        info!(path = %path.display(), rows = self.len(), "wrote long-form dataset");
        Ok(())
    }
}
