use std::collections::BTreeMap;

use tracing::{debug, info};

use super::constants::{derive_constants, DerivedConstants, SvjdInputs};
use super::distributions::{standard_normal_cdf, GammaQuantile};
use crate::error::{ensure_finite, Result, SorterError};
use crate::models::factor_loadings::{FactorLoadingRow, FactorLoadingTable, GridKey, IvColumn};
use crate::params::ModelSet;

pub const DEFAULT_STEP_SIZE: f64 = 0.01;

/// Percentiles `step, 2·step, …, 1 − step`.
///
/// The number of intervals is `round(1 / step)`, so a step that does not divide 1 exactly
/// is snapped to the nearest grid. `step` must lie in `(0, 0.5]`.
pub fn percentile_grid(step: f64) -> Result<Vec<f64>> {
    if !(step.is_finite() && step > 0.0 && step <= 0.5) {
        return Err(SorterError::invalid_argument(format!(
            "step size must lie in (0, 0.5], got {}",
            step
        )));
    }
    let n = (1.0 / step).round() as usize;
    Ok((1..n).map(|i| i as f64 * step).collect())
}

/// Outcome of one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct NegativeIvResult {
    /// Largest cumulative probability over the table.
    pub probability: f64,
    /// Grid point attaining it; the lowest key wins ties.
    pub worst_point: GridKey,
    pub column: IvColumn,
    pub constants: DerivedConstants,
}

/// Per-row threshold `−(IV + c_L·LevelBeta·(√(a + y) + b)) / beta_2`.
fn threshold(row: &FactorLoadingRow, column: IvColumn, c_l: f64, c: &DerivedConstants, y: f64) -> f64 {
    -(row.iv(column) + c_l * row.level_beta * ((c.parameter_a + y).sqrt() + c.parameter_b))
        / row.beta_2()
}

/// Riemann-sum probability of a negative IV at every grid point of `table`.
pub fn cumulative_probabilities(
    c_l: f64,
    constants: &DerivedConstants,
    table: &FactorLoadingTable,
    column: IvColumn,
    step: f64,
) -> Result<BTreeMap<GridKey, f64>> {
    let grid = percentile_grid(step)?;
    let gamma = GammaQuantile::new(constants.gamma_k, constants.gamma_theta)?;
    let draws = grid
        .iter()
        .map(|&p| gamma.quantile(p))
        .collect::<Result<Vec<f64>>>()?;
    debug!(
        percentiles = grid.len(),
        rows = table.len(),
        column = %column,
        "integrating negative-IV probability"
    );

    let mut out = BTreeMap::new();
    for (key, row) in table.iter() {
        let total: f64 = draws
            .iter()
            .map(|&y| step * standard_normal_cdf(threshold(row, column, c_l, constants, y)))
            .sum();
        let total = ensure_finite("cumulative_probability", total)?;
        out.insert(*key, total);
    }
    Ok(out)
}

/// Worst-case negative-IV probability from precomputed inputs.
///
/// The derived constants travel in the result. If the integration fails after they were
/// derived (a non-finite row sum), they are not part of the error; call [`derive_constants`]
/// on the same inputs to audit the failed run, it depends on `inputs` alone.
pub fn probability_from_inputs(
    c_l: f64,
    inputs: &SvjdInputs,
    table: &FactorLoadingTable,
    column: IvColumn,
    step: f64,
) -> Result<NegativeIvResult> {
    if table.is_empty() {
        return Err(SorterError::malformed(
            "factor-loading table is empty, no grid point to evaluate",
        ));
    }
    let constants = derive_constants(inputs)?;
    let per_row = cumulative_probabilities(c_l, &constants, table, column, step)?;

    // Strict comparison keeps the first (lowest) key on ties
    let mut best: Option<(GridKey, f64)> = None;
    for (key, p) in per_row {
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((key, p)),
        }
    }
    let (worst_point, probability) =
        best.ok_or_else(|| SorterError::malformed("factor-loading table is empty"))?;

    info!(
        column = %column,
        probability,
        maturity = worst_point.maturity(),
        strike = worst_point.strike(),
        "negative-IV probability"
    );
    Ok(NegativeIvResult {
        probability,
        worst_point,
        column,
        constants,
    })
}

/// Worst-case probability that the `column` surface turns negative.
///
/// Model parameters are read from `models` (`F1.SVJD`, `Asset.Betas`, `Asset.SVJD`,
/// `Factors.Const`); `c_l` scales the level factor.
pub fn probability_of_negative_iv(
    c_l: f64,
    models: &ModelSet,
    table: &FactorLoadingTable,
    column: IvColumn,
    step: f64,
) -> Result<NegativeIvResult> {
    let inputs = SvjdInputs::from_models(models)?;
    probability_from_inputs(c_l, &inputs, table, column, step)
}
