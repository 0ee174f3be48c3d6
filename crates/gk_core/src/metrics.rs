//! Regression metrics and their persisted reports

use crate::errors::{CoreError, Result};
use crate::model::ModelVariant;
use crate::serialization::canonical_json_string;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Held-out scores for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Mean absolute percentage error, in percent, over non-zero targets
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(CoreError::InvalidParameters(format!(
                "target length {} differs from prediction length {}",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(CoreError::EmptyDataset("no rows to score".into()));
        }

        let n = y_true.len() as f64;
        let mean = y_true.sum() / n;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_rows = 0usize;

        for (&y, &p) in y_true.iter().zip(y_pred.iter()) {
            let err = y - p;
            ss_res += err * err;
            ss_tot += (y - mean) * (y - mean);
            abs_sum += err.abs();
            if y != 0.0 {
                pct_sum += (err / y).abs();
                pct_rows += 1;
            }
        }

        let mse = ss_res / n;
        let r2 = if ss_tot == 0.0 {
            // Constant target: perfect fit scores 1, anything else 0
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };
        let mape = if pct_rows == 0 {
            0.0
        } else {
            pct_sum / pct_rows as f64 * 100.0
        };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs_sum / n,
            r2,
            mape,
        })
    }
}

/// Fit quality logged right after training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl From<&RegressionMetrics> for FitMetrics {
    fn from(m: &RegressionMetrics) -> Self {
        Self {
            mse: m.mse,
            rmse: m.rmse,
            r2: m.r2,
        }
    }
}

/// Metrics keyed by variant name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsReport<M = RegressionMetrics> {
    entries: BTreeMap<String, M>,
}

impl<M> MetricsReport<M>
where
    M: Serialize + for<'de> Deserialize<'de>,
{
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, variant: ModelVariant, metrics: M) {
        self.entries.insert(variant.as_str().to_string(), metrics);
    }

    pub fn get(&self, variant: ModelVariant) -> Option<&M> {
        self.entries.get(variant.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &M)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json(path.as_ref(), self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Evaluator's choice of model to serve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub variant: ModelVariant,
    pub r2: f64,
}

impl BestModel {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json(path.as_ref(), self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, canonical_json_string(value)?)?;
    Ok(())
}
