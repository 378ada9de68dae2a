use serde_json::{Map, Value};

use crate::error::{Result, SorterError};
use crate::models::factor_loadings::FactorLoadingTable;
use crate::models::negative_iv::NegativeIvResult;
use crate::params::{encode_value, ModelSet, ParamValue, ParameterMap};

pub const SETTINGS_MODEL: &str = "Settings";
pub const INITIAL_IV_MODEL: &str = "InitialIV";
pub const BETAS_MODEL: &str = "RWOIV.Betas";
pub const STATIC_MODEL: &str = "RWOIV.Static";

pub const INITIAL_IV_TABLE: &str = "Equity.ImpliedVol";
pub const BETAS_TABLE: &str = "FactorLoadings";

pub const SCALING_FACTOR: &str = "ScalingFactor";
pub const APPLY_SMOOTHING: &str = "ApplySmoothing";

/// Parameters copied unchanged from `RWOIV.Static` into the output.
pub const STATIC_PARAMETERS: [&str; 13] = [
    "SigmaInf",
    "Skew.Alpha",
    "Skew.Sigma",
    "Skew.Mu",
    "Skew.StartVal",
    "Kurtosis.Alpha",
    "Kurtosis.Sigma",
    "Kurtosis.Mu",
    "Kurtosis.StartVal",
    "TermStructure.Alpha",
    "TermStructure.Sigma",
    "TermStructure.Mu",
    "TermStructure.StartVal",
];

/// Run switches read from the `Settings` model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Level scaling `c_L`.
    pub scaling_factor: f64,
    pub apply_smoothing: bool,
}

impl Settings {
    pub fn from_models(models: &ModelSet) -> Result<Self> {
        let settings = models.model(SETTINGS_MODEL)?;
        let scaling_factor = settings.scalar_f64(SCALING_FACTOR)?;
        if !scaling_factor.is_finite() {
            return Err(SorterError::computation(SCALING_FACTOR, scaling_factor));
        }
        Ok(Self {
            scaling_factor,
            apply_smoothing: settings.scalar_bool(APPLY_SMOOTHING)?,
        })
    }
}

/// Everything the sorter produces for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SorterOutput {
    pub output_name: String,
    pub settings: Settings,
    /// Whether the curve columns of `factor_loadings` were smoothed.
    pub smoothed: bool,
    pub factor_loadings: FactorLoadingTable,
    /// The `RWOIV.Static` entries, in output order.
    pub static_parameters: ParameterMap,
    /// Raw `F1.SVJD` variance mean-reversion rate.
    pub level_alpha: ParamValue,
    pub iv_inf: NegativeIvResult,
    pub initial_iv: NegativeIvResult,
}

impl SorterOutput {
    /// The output parameter set in wire order.
    pub fn to_parameter_map(&self) -> ParameterMap {
        let mut out = ParameterMap::new();
        out.insert(
            BETAS_TABLE,
            ParamValue::Table(self.factor_loadings.to_rows()),
        );
        for (name, value) in self.static_parameters.iter() {
            out.insert(name, value.clone());
        }
        out.insert("Level.JumpVol", ParamValue::from(0.0));
        out.insert(
            "Level.LevelScaling",
            ParamValue::from(self.settings.scaling_factor),
        );
        out.insert("Level.LevelDisplacement", ParamValue::from(0.0));
        out.insert("Level.Alpha", self.level_alpha.clone());
        out.insert(
            "Prob.NegativeIV.DerivedConstants",
            ParamValue::Table(self.iv_inf.constants.to_rows()),
        );
        out.insert(
            "Prob.NegativeIV.IVInf",
            ParamValue::from(self.iv_inf.probability),
        );
        out.insert(
            "Prob.NegativeIV.InitialIV",
            ParamValue::from(self.initial_iv.probability),
        );
        out
    }

    /// `{ output_name: [wire entries] }`
    pub fn to_document(&self) -> Result<Value> {
        let mut doc = Map::new();
        doc.insert(
            self.output_name.clone(),
            encode_value(&self.to_parameter_map())?,
        );
        Ok(Value::Object(doc))
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let doc = self.to_document()?;
        let text = if pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        };
        text.map_err(|e| SorterError::malformed(format!("cannot serialise output: {}", e)))
    }
}
