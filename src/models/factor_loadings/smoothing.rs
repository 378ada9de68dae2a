use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::interp::linear_interp;
use super::types::{from_ticks, FactorLoadingTable, GridKey};
use crate::error::{Result, SorterError};
use crate::params::Row;

/// Coarse sampling strikes in micro-units: 0.6 to 1.4 by 0.1.
pub fn coarse_strike_ticks() -> Vec<i64> {
    (600_000..=1_400_000).step_by(100_000).collect()
}

/// Output strikes in micro-units: 0.6 to 1.4 by 0.05.
pub fn fine_strike_ticks() -> Vec<i64> {
    (600_000..=1_400_000).step_by(50_000).collect()
}

pub const SMOOTHED_COLUMNS: [&str; 3] = [
    "SmooSkewBeta",
    "SmooKurtosisBeta",
    "SmooTermStructureBeta",
];

/// Smoothed skew, kurtosis and term-structure loadings at one grid point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedCurve {
    pub skew_beta: f64,
    pub kurtosis_beta: f64,
    pub term_structure_beta: f64,
}

/// Smoother output keyed by (maturity, output strike).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothedCurves {
    points: BTreeMap<GridKey, SmoothedCurve>,
}

impl SmoothedCurves {
    pub fn get(&self, key: &GridKey) -> Option<&SmoothedCurve> {
        self.points.get(key)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridKey, &SmoothedCurve)> {
        self.points.iter()
    }

    pub fn to_rows(&self) -> Vec<Row> {
        self.points
            .iter()
            .map(|(key, c)| {
                let mut row = Row::new();
                row.insert("Maturity".to_string(), Value::from(key.maturity()));
                row.insert("Strike".to_string(), Value::from(key.strike()));
                for (name, v) in SMOOTHED_COLUMNS.iter().zip([
                    c.skew_beta,
                    c.kurtosis_beta,
                    c.term_structure_beta,
                ]) {
                    row.insert(name.to_string(), Value::from(v));
                }
                row
            })
            .collect()
    }
}

/// Interpolate the three curve columns of every maturity onto the fine strike grid.
///
/// Only rows on the coarse grid feed the interpolants. A maturity whose coarse points do
/// not span every output strike fails with [`SorterError::InterpolationDomain`].
pub fn smooth_curves(table: &FactorLoadingTable) -> Result<SmoothedCurves> {
    let coarse = coarse_strike_ticks();
    let fine = fine_strike_ticks();
    let mut out = SmoothedCurves::default();

    for maturity in table.maturity_ticks() {
        // Three curves sampled at the coarse strikes, ascending
        let mut samples: [Vec<(f64, f64)>; 3] = Default::default();
        for &strike in &coarse {
            if let Some(row) = table.get(&GridKey::from_ticks(maturity, strike)) {
                for (curve, beta) in samples.iter_mut().zip(row.curves()) {
                    curve.push((from_ticks(strike), beta));
                }
            }
        }

        let n_coarse = samples[0].len();
        for &strike in &fine {
            let x = from_ticks(strike);
            let mut values = [0.0; 3];
            for (slot, curve) in values.iter_mut().zip(&samples) {
                *slot = linear_interp(curve, x).ok_or_else(|| SorterError::InterpolationDomain {
                    maturity: from_ticks(maturity),
                    strike: x,
                    message: format!(
                        "{} coarse strike(s) available, need at least 2 spanning [0.6, 1.4]",
                        n_coarse
                    ),
                })?;
            }
            out.points.insert(
                GridKey::from_ticks(maturity, strike),
                SmoothedCurve {
                    skew_beta: values[0],
                    kurtosis_beta: values[1],
                    term_structure_beta: values[2],
                },
            );
        }
        debug!(
            maturity = from_ticks(maturity),
            coarse_points = n_coarse,
            "smoothed factor-loading curves"
        );
    }

    Ok(out)
}

/// Overwrite the curve columns of `table` with their smoothed counterparts.
///
/// Returns the keys that had no smoothed value (strikes off the fine grid); those rows keep
/// their original loadings.
pub fn merge_smoothed(table: &mut FactorLoadingTable, curves: &SmoothedCurves) -> Vec<GridKey> {
    let keys: Vec<GridKey> = table.keys().copied().collect();
    let mut untouched = Vec::new();
    for key in keys {
        match (curves.get(&key), table.get_mut(&key)) {
            (Some(c), Some(row)) => {
                row.skew_beta = c.skew_beta;
                row.kurtosis_beta = c.kurtosis_beta;
                row.term_structure_beta = c.term_structure_beta;
            }
            _ => untouched.push(key),
        }
    }
    untouched
}

/// Smooth `table` in place. Fails without modifying it if any maturity cannot be smoothed.
pub fn apply_smoothing(table: &mut FactorLoadingTable) -> Result<()> {
    let curves = smooth_curves(table)?;
    let untouched = merge_smoothed(table, &curves);
    if !untouched.is_empty() {
        warn!(
            rows = untouched.len(),
            first = %untouched[0],
            "factor-loading rows off the smoothing grid keep their original loadings"
        );
    }
    Ok(())
}
