//! # EOIV-Sorter: Negative Implied-Volatility Risk for Equity Option IV Models
//!
//! `eoiv-sorter` post-processes the calibrated inputs of a real-world equity option implied
//! volatility model. It joins the initial IV surface with the factor loadings of the IV
//! model, optionally smooths the loading curves, and estimates, for both the long-run and
//! the current surface, the worst-case probability that the modelled IV turns negative.
//!
//! ## Core Features
//!
//! - **Parameter Codec**: lossless conversion between the `[{name, values}]` wire format and
//!   an ordered parameter map, with single-value tables flattened to scalars
//! - **Curve Smoother**: piecewise-linear re-sampling of the skew, kurtosis and
//!   term-structure loadings onto a 0.05 strike grid
//! - **Negative-IV Engine**: Gamma-fitted stationary variance, jump-adjusted level terms and a
//!   percentile-grid integration of the normal tail per grid point
//! - **Orchestration**: a single call from a model dictionary to the output model document
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoiv_sorter::{run_sorter_json, default_configs};
//!
//! let input = std::fs::read_to_string("models.json")?;
//! let output = run_sorter_json(&input, &default_configs::standard(), true)?;
//! println!("{output}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Input Models
//!
//! The model dictionary maps model names to model documents, each holding its parameter list
//! under `"model"`:
//! - `Settings`: `ScalingFactor`, `ApplySmoothing`
//! - `InitialIV`: table `Equity.ImpliedVol`
//! - `RWOIV.Betas`: table `FactorLoadings`
//! - `RWOIV.Static`: static IV-model parameters copied to the output
//! - `F1.SVJD`, `Asset.SVJD`, `Asset.Betas`, `Factors.Const`: variance, jump and factor inputs
//!
//! ## Configuration Presets
//!
//! - `standard()`: 0.01 percentile step (99 points)
//! - `fine()`: 0.001 percentile step, for convergence checks

// ================================================================================================
// MODULES
// ================================================================================================

pub mod error;
pub mod models;
pub mod params;
pub mod tool;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Errors
pub use error::{Result, SorterError};

// Parameter codec
pub use params::{
    decode_list, decode_wire, encode, flatten_scalars, ModelSet, ParamValue, ParameterMap, Row,
    WireEntry, WireParameterSet,
};

// Factor loadings and smoothing
pub use models::factor_loadings::{
    smooth_curves, FactorLoadingRow, FactorLoadingTable, GridKey, IvColumn, SmoothedCurves,
};

// Negative-IV engine
pub use models::negative_iv::{
    derive_constants, DerivedConstants, NegativeIvResult, SvjdInputs, DEFAULT_STEP_SIZE,
};

// Orchestration
pub use tool::{decode_model_dict, run_sorter, Settings, SorterConfig, SorterOutput};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured sorter settings.
///
/// - [`standard()`]: production grid
/// - [`fine()`]: ten times denser percentile grid
pub mod default_configs {
    use crate::tool::SorterConfig;

    /// Percentile step 0.01, parameter lists under `"model"`, output model named `"Output"`.
    pub fn standard() -> SorterConfig {
        SorterConfig::standard()
    }

    /// Same as [`standard()`] with a percentile step of 0.001.
    ///
    /// The worst-case probability moves by less than the coarser step's granularity, which makes
    /// this preset useful for checking Riemann-sum convergence on new inputs.
    pub fn fine() -> SorterConfig {
        SorterConfig::fine()
    }
}

// ================================================================================================
// PUBLIC API FUNCTIONS
// ================================================================================================

/// Run the sorter on a model dictionary given as JSON text.
///
/// # Arguments
///
/// * `model_dict_json` - JSON object mapping model names to model documents (as strings or
///   inline values)
/// * `config` - run configuration; see [`default_configs`]
/// * `pretty` - pretty-print the result document
///
/// # Returns
///
/// The result document `{ <output_name>: [wire entries] }` as JSON text.
///
/// # Errors
///
/// Any [`SorterError`]: malformed payloads, missing models or parameters, smoothing domain
/// failures, or non-finite derived quantities. Nothing is returned on failure.
pub fn run_sorter_json(model_dict_json: &str, config: &SorterConfig, pretty: bool) -> Result<String> {
    tool::run_sorter_json(model_dict_json, config, pretty)
}

/// Worst-case negative-IV probability of one IV column, straight from decoded models.
///
/// Unlike [`run_sorter`], this skips the `Settings` model and smoothing: the caller supplies
/// the level scaling `c_l` and an already built factor-loading table.
///
/// # Example
///
/// ```rust,no_run
/// use eoiv_sorter::{decode_model_dict, probability_of_negative_iv, IvColumn, DEFAULT_STEP_SIZE};
/// use eoiv_sorter::tool::build_factor_loadings;
///
/// let models = decode_model_dict(&std::fs::read_to_string("models.json")?, Some("model"))?;
/// let table = build_factor_loadings(&models)?;
/// let result = probability_of_negative_iv(1.8, &models, &table, IvColumn::IvInf, DEFAULT_STEP_SIZE)?;
/// println!("{:.3e} at {}", result.probability, result.worst_point);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn probability_of_negative_iv(
    c_l: f64,
    models: &ModelSet,
    table: &FactorLoadingTable,
    column: IvColumn,
    step_size: f64,
) -> Result<NegativeIvResult> {
    crate::models::negative_iv::probability_of_negative_iv(c_l, models, table, column, step_size)
}
