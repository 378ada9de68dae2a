use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SorterError};
use crate::params::Row;

/// Grid keys are held in integer micro-units so that 0.6, 0.60 and "0.6" all coincide.
pub const KEY_SCALE: f64 = 1_000_000.0;

pub fn to_ticks(x: f64) -> i64 {
    (x * KEY_SCALE).round() as i64
}

pub fn from_ticks(ticks: i64) -> f64 {
    ticks as f64 / KEY_SCALE
}

/// A (maturity, strike) point of the factor-loading grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridKey {
    maturity: i64,
    strike: i64,
}

impl GridKey {
    pub fn new(maturity: f64, strike: f64) -> Self {
        Self {
            maturity: to_ticks(maturity),
            strike: to_ticks(strike),
        }
    }

    /// Key for coordinates read from input tables; NaN and infinite coordinates are rejected.
    pub fn try_new(maturity: f64, strike: f64) -> Result<Self> {
        if !(maturity.is_finite() && strike.is_finite()) {
            return Err(SorterError::malformed(format!(
                "grid key (maturity {}, strike {}) is not finite",
                maturity, strike
            )));
        }
        Ok(Self::new(maturity, strike))
    }

    pub fn from_ticks(maturity: i64, strike: i64) -> Self {
        Self { maturity, strike }
    }

    pub fn maturity(&self) -> f64 {
        from_ticks(self.maturity)
    }

    pub fn strike(&self) -> f64 {
        from_ticks(self.strike)
    }

    pub fn maturity_ticks(&self) -> i64 {
        self.maturity
    }

    pub fn strike_ticks(&self) -> i64 {
        self.strike
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(maturity {}, strike {})", self.maturity(), self.strike())
    }
}

/// Which implied-volatility column drives the negative-IV calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IvColumn {
    /// Unconditional (long-run) surface.
    #[default]
    #[serde(rename = "IVInf")]
    IvInf,
    /// Current surface from the initial-IV model.
    #[serde(rename = "InitialIV")]
    InitialIv,
}

impl IvColumn {
    pub fn name(&self) -> &'static str {
        match self {
            IvColumn::IvInf => "IVInf",
            IvColumn::InitialIv => "InitialIV",
        }
    }
}

impl fmt::Display for IvColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The beta-source half of a factor-loading row, before the join with initial IVs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadingBetas {
    pub iv_inf: f64,
    pub level_beta: f64,
    pub skew_beta: f64,
    pub kurtosis_beta: f64,
    pub term_structure_beta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorLoadingRow {
    pub initial_iv: f64,
    pub iv_inf: f64,
    pub level_beta: f64,
    pub skew_beta: f64,
    pub kurtosis_beta: f64,
    pub term_structure_beta: f64,
}

impl FactorLoadingRow {
    pub fn from_parts(initial_iv: f64, betas: LoadingBetas) -> Self {
        Self {
            initial_iv,
            iv_inf: betas.iv_inf,
            level_beta: betas.level_beta,
            skew_beta: betas.skew_beta,
            kurtosis_beta: betas.kurtosis_beta,
            term_structure_beta: betas.term_structure_beta,
        }
    }

    pub fn iv(&self, column: IvColumn) -> f64 {
        match column {
            IvColumn::IvInf => self.iv_inf,
            IvColumn::InitialIv => self.initial_iv,
        }
    }

    /// Euclidean norm of the skew, kurtosis and term-structure loadings.
    pub fn beta_2(&self) -> f64 {
        (self.skew_beta.powi(2) + self.kurtosis_beta.powi(2) + self.term_structure_beta.powi(2))
            .sqrt()
    }

    pub fn curves(&self) -> [f64; 3] {
        [
            self.skew_beta,
            self.kurtosis_beta,
            self.term_structure_beta,
        ]
    }
}

/// Keys dropped by [`FactorLoadingTable::join`] because only one source had them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinReport {
    pub initial_only: Vec<GridKey>,
    pub betas_only: Vec<GridKey>,
}

impl JoinReport {
    pub fn dropped(&self) -> usize {
        self.initial_only.len() + self.betas_only.len()
    }
}

/// Factor loadings keyed by unique (maturity, strike), iterated in ascending key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorLoadingTable {
    rows: BTreeMap<GridKey, FactorLoadingRow>,
}

pub const OUTPUT_COLUMNS: [&str; 9] = [
    "Maturity",
    "Strike",
    "InitialIV",
    "IVInf",
    "LevelBeta",
    "SkewBeta",
    "KurtosisBeta",
    "TermStructureBeta",
    "_index",
];

impl FactorLoadingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the two sources on (maturity, strike); keys present in only one source are dropped.
    pub fn join(
        initial_iv: &BTreeMap<GridKey, f64>,
        betas: &BTreeMap<GridKey, LoadingBetas>,
    ) -> (Self, JoinReport) {
        let mut table = Self::new();
        let mut report = JoinReport::default();

        for (key, iv) in initial_iv {
            match betas.get(key) {
                Some(b) => {
                    table.insert(*key, FactorLoadingRow::from_parts(*iv, *b));
                }
                None => report.initial_only.push(*key),
            }
        }
        report.betas_only = betas
            .keys()
            .filter(|key| !initial_iv.contains_key(key))
            .copied()
            .collect();

        (table, report)
    }

    pub fn insert(&mut self, key: GridKey, row: FactorLoadingRow) -> Option<FactorLoadingRow> {
        self.rows.insert(key, row)
    }

    pub fn get(&self, key: &GridKey) -> Option<&FactorLoadingRow> {
        self.rows.get(key)
    }

    pub fn get_mut(&mut self, key: &GridKey) -> Option<&mut FactorLoadingRow> {
        self.rows.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridKey, &FactorLoadingRow)> {
        self.rows.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &GridKey> {
        self.rows.keys()
    }

    /// Distinct maturities in tick units, ascending.
    pub fn maturity_ticks(&self) -> Vec<i64> {
        let mut ticks: Vec<i64> = self.rows.keys().map(GridKey::maturity_ticks).collect();
        ticks.dedup();
        ticks
    }

    /// Wire rows sorted by (maturity, strike) with a 1-based `_index` column.
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, (key, r))| {
                let cells = [
                    Value::from(key.maturity()),
                    Value::from(key.strike()),
                    Value::from(r.initial_iv),
                    Value::from(r.iv_inf),
                    Value::from(r.level_beta),
                    Value::from(r.skew_beta),
                    Value::from(r.kurtosis_beta),
                    Value::from(r.term_structure_beta),
                    Value::from(i + 1),
                ];
                OUTPUT_COLUMNS
                    .iter()
                    .map(|c| c.to_string())
                    .zip(cells)
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn betas(skew: f64) -> LoadingBetas {
        LoadingBetas {
            iv_inf: 0.2,
            level_beta: 1.0,
            skew_beta: skew,
            kurtosis_beta: 0.0,
            term_structure_beta: 0.0,
        }
    }

    #[test]
    fn grid_keys_are_canonical() {
        assert_eq!(GridKey::new(1.0, 0.6), GridKey::new(1.0, 0.60000000001));
        assert_eq!(GridKey::new(1.0, 0.1 + 0.2), GridKey::new(1.0, 0.3));
        assert_eq!(GridKey::new(2.0, 1.35).strike_ticks(), 1_350_000);
        assert!(GridKey::new(1.0, 1.4) < GridKey::new(2.0, 0.6));
    }

    #[test]
    fn try_new_rejects_non_finite_coordinates() {
        assert_eq!(GridKey::try_new(1.0, 0.6).unwrap(), GridKey::new(1.0, 0.6));
        assert!(GridKey::try_new(f64::NAN, 0.6).is_err());
        assert!(GridKey::try_new(1.0, f64::INFINITY).is_err());
        assert!(GridKey::try_new(f64::NEG_INFINITY, 1.0).is_err());
    }

    #[test]
    fn join_keeps_only_matched_keys() {
        let mut initial = BTreeMap::new();
        initial.insert(GridKey::new(1.0, 0.6), 0.3);
        initial.insert(GridKey::new(1.0, 0.7), 0.28);
        let mut b = BTreeMap::new();
        b.insert(GridKey::new(1.0, 0.7), betas(0.01));
        b.insert(GridKey::new(2.0, 0.7), betas(0.02));

        let (table, report) = FactorLoadingTable::join(&initial, &b);
        assert_eq!(table.len(), 1);
        let row = table.get(&GridKey::new(1.0, 0.7)).unwrap();
        assert_eq!(row.initial_iv, 0.28);
        assert_eq!(row.skew_beta, 0.01);
        assert_eq!(report.initial_only, vec![GridKey::new(1.0, 0.6)]);
        assert_eq!(report.betas_only, vec![GridKey::new(2.0, 0.7)]);
        assert_eq!(report.dropped(), 2);
    }

    #[test]
    fn beta_2_is_euclidean_norm() {
        let row = FactorLoadingRow {
            initial_iv: 0.2,
            iv_inf: 0.2,
            level_beta: 1.0,
            skew_beta: 3.0,
            kurtosis_beta: 4.0,
            term_structure_beta: 12.0,
        };
        assert_eq!(row.beta_2(), 13.0);
        assert_eq!(row.iv(IvColumn::InitialIv), 0.2);
    }

    #[test]
    fn rows_carry_one_based_index() {
        let mut table = FactorLoadingTable::new();
        table.insert(
            GridKey::new(2.0, 0.6),
            FactorLoadingRow::from_parts(0.25, betas(0.0)),
        );
        table.insert(
            GridKey::new(1.0, 0.6),
            FactorLoadingRow::from_parts(0.3, betas(0.0)),
        );
        let rows = table.to_rows();
        assert_eq!(rows[0]["Maturity"], Value::from(1.0));
        assert_eq!(rows[0]["_index"], Value::from(1));
        assert_eq!(rows[1]["_index"], Value::from(2));
        assert_eq!(
            rows[0].keys().map(String::as_str).collect::<Vec<_>>(),
            OUTPUT_COLUMNS.to_vec()
        );
    }
}
