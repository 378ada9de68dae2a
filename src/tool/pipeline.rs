use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SorterError};
use crate::models::factor_loadings::{
    apply_smoothing, FactorLoadingTable, GridKey, IvColumn, LoadingBetas,
};
use crate::models::negative_iv::constants::PRIMARY_SVJD_MODEL;
use crate::models::negative_iv::{probability_from_inputs, SvjdInputs};
use crate::params::{decode_value, decode_wire, is_gap, value_as_f64, ModelSet, ParameterMap, Row};
use crate::tool::config::SorterConfig;
use crate::tool::types::*;

/// Decode a model dictionary: a JSON object mapping model names to model payloads.
///
/// Each payload is either a JSON string holding the model document (as upstream stages
/// write it) or the document inlined as a JSON value.
pub fn decode_model_dict(json_text: &str, model_key: Option<&str>) -> Result<ModelSet> {
    let payload: Value = serde_json::from_str(json_text)
        .map_err(|e| SorterError::malformed(format!("invalid model dictionary: {}", e)))?;
    let Value::Object(entries) = payload else {
        return Err(SorterError::malformed(
            "model dictionary must be a JSON object of model name to payload",
        ));
    };

    let mut models = ModelSet::new();
    for (name, value) in entries {
        let params = match value {
            Value::String(text) => decode_wire(&text, model_key),
            other => decode_value(other, model_key),
        }
        .map_err(|e| in_model(e, &name))?;
        debug!(model = %name, parameters = params.len(), "decoded input model");
        models.insert(name, params);
    }
    Ok(models)
}

fn in_model(err: SorterError, model: &str) -> SorterError {
    match err {
        SorterError::MalformedInput { message } => {
            SorterError::malformed(format!("model '{}': {}", model, message))
        }
        SorterError::MissingKey { key, context } => {
            SorterError::missing(key, format!("{} of model '{}'", context, model))
        }
        other => other,
    }
}

/// Numeric cells of `row` under `columns`, or None if any of them is a gap.
fn numeric_cells<const N: usize>(row: &Row, columns: [&str; N], table: &str) -> Result<Option<[f64; N]>> {
    let mut out = [0.0; N];
    for (slot, column) in out.iter_mut().zip(columns) {
        let cell = match row.get(column) {
            Some(cell) if !is_gap(cell) => cell,
            _ => return Ok(None),
        };
        *slot = value_as_f64(cell).ok_or_else(|| {
            SorterError::malformed(format!(
                "table '{}' column '{}' is not numeric: {}",
                table, column, cell
            ))
        })?;
    }
    Ok(Some(out))
}

/// Rows of one source table must land on distinct grid keys, spelling aside.
fn insert_unique<T>(
    out: &mut BTreeMap<GridKey, T>,
    key: GridKey,
    value: T,
    table: &str,
) -> Result<()> {
    match out.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
        Entry::Occupied(_) => Err(SorterError::malformed(format!(
            "table '{}' has more than one row at {}",
            table, key
        ))),
    }
}

/// `InitialIV/Equity.ImpliedVol` keyed by (term, strike).
pub fn read_initial_iv(models: &ModelSet) -> Result<BTreeMap<GridKey, f64>> {
    let rows = models.table(INITIAL_IV_MODEL, INITIAL_IV_TABLE)?;
    let mut out = BTreeMap::new();
    let mut gaps = 0usize;
    for row in rows {
        match numeric_cells(row, ["term", "strike", "value"], INITIAL_IV_TABLE)? {
            Some([term, strike, iv]) => {
                let key = GridKey::try_new(term, strike)?;
                insert_unique(&mut out, key, iv, INITIAL_IV_TABLE)?;
            }
            None => gaps += 1,
        }
    }
    if gaps > 0 {
        debug!(rows = gaps, table = INITIAL_IV_TABLE, "dropped rows with empty cells");
    }
    Ok(out)
}

/// `RWOIV.Betas/FactorLoadings` keyed by (maturity, strike).
pub fn read_betas(models: &ModelSet) -> Result<BTreeMap<GridKey, LoadingBetas>> {
    let rows = models.table(BETAS_MODEL, BETAS_TABLE)?;
    let columns = [
        "maturity",
        "strike",
        "ivInf",
        "levelBeta",
        "skewBeta",
        "kurtosisBeta",
        "termStructureBeta",
    ];
    let mut out = BTreeMap::new();
    let mut gaps = 0usize;
    for row in rows {
        match numeric_cells(row, columns, BETAS_TABLE)? {
            Some([maturity, strike, iv_inf, level, skew, kurtosis, term_structure]) => {
                let betas = LoadingBetas {
                    iv_inf,
                    level_beta: level,
                    skew_beta: skew,
                    kurtosis_beta: kurtosis,
                    term_structure_beta: term_structure,
                };
                let key = GridKey::try_new(maturity, strike)?;
                insert_unique(&mut out, key, betas, BETAS_TABLE)?;
            }
            None => gaps += 1,
        }
    }
    if gaps > 0 {
        debug!(rows = gaps, table = BETAS_TABLE, "dropped rows with empty cells");
    }
    Ok(out)
}

/// Join initial IVs and betas into the factor-loading table. Unmatched keys are dropped.
pub fn build_factor_loadings(models: &ModelSet) -> Result<FactorLoadingTable> {
    let initial = read_initial_iv(models)?;
    let betas = read_betas(models)?;
    let (table, report) = FactorLoadingTable::join(&initial, &betas);

    if report.dropped() > 0 {
        warn!(
            initial_only = report.initial_only.len(),
            betas_only = report.betas_only.len(),
            "dropped factor-loading rows without a match"
        );
    }
    if table.is_empty() {
        return Err(SorterError::malformed(
            "no (maturity, strike) point is present in both InitialIV and RWOIV.Betas",
        ));
    }
    Ok(table)
}

fn static_parameters(models: &ModelSet) -> Result<ParameterMap> {
    let mut out = ParameterMap::new();
    for name in STATIC_PARAMETERS {
        out.insert(name, models.require(STATIC_MODEL, name)?.clone());
    }
    Ok(out)
}

/// Run the whole sorter over decoded input models.
pub fn run_sorter(models: &ModelSet, config: &SorterConfig) -> Result<SorterOutput> {
    let settings = Settings::from_models(models)?;
    let smoothed = config.apply_smoothing.unwrap_or(settings.apply_smoothing);

    let mut table = build_factor_loadings(models)?;
    if smoothed {
        apply_smoothing(&mut table)?;
    }

    let inputs = SvjdInputs::from_models(models)?;
    let iv_inf = probability_from_inputs(
        settings.scaling_factor,
        &inputs,
        &table,
        IvColumn::IvInf,
        config.step_size,
    )?;
    let initial_iv = probability_from_inputs(
        settings.scaling_factor,
        &inputs,
        &table,
        IvColumn::InitialIv,
        config.step_size,
    )?;

    let output = SorterOutput {
        output_name: config.output_name.clone(),
        settings,
        smoothed,
        factor_loadings: table,
        static_parameters: static_parameters(models)?,
        level_alpha: models
            .require(PRIMARY_SVJD_MODEL, "BE_SVJD_E_Var_RevRate_F1")?
            .clone(),
        iv_inf,
        initial_iv,
    };
    info!(
        rows = output.factor_loadings.len(),
        smoothed,
        iv_inf = output.iv_inf.probability,
        initial_iv = output.initial_iv.probability,
        "sorter run complete"
    );
    Ok(output)
}

/// Decode a model dictionary, run the sorter, and serialise the result document.
pub fn run_sorter_json(json_text: &str, config: &SorterConfig, pretty: bool) -> Result<String> {
    let models = decode_model_dict(json_text, config.model_key.as_deref())?;
    run_sorter(&models, config)?.to_json(pretty)
}
