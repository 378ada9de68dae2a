use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ensure_finite, Result};
use crate::params::{ModelSet, Row};

pub const PRIMARY_SVJD_MODEL: &str = "F1.SVJD";
pub const ASSET_BETAS_MODEL: &str = "Asset.Betas";
pub const ASSET_SVJD_MODEL: &str = "Asset.SVJD";
pub const FACTOR_CONST_MODEL: &str = "Factors.Const";

/// A mean-reverting square-root variance process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceProcess {
    pub rev_level: f64,
    pub vol: f64,
    pub rev_rate: f64,
}

impl VarianceProcess {
    /// Variance of the stationary distribution: `vol² · rev_level / (2 · rev_rate)`.
    pub fn stationary_variance(&self) -> f64 {
        self.vol.powi(2) * self.rev_level / (2.0 * self.rev_rate)
    }

    fn from_model(models: &ModelSet, model: &str, suffix: &str) -> Result<Self> {
        Ok(Self {
            rev_level: models.scalar_f64(model, &format!("BE_SVJD_E_Var_RevLevel{}", suffix))?,
            vol: models.scalar_f64(model, &format!("BE_SVJD_E_Var_Vol{}", suffix))?,
            rev_rate: models.scalar_f64(model, &format!("BE_SVJD_E_Var_RevRate{}", suffix))?,
        })
    }
}

/// A compound-Poisson jump process with normal jump sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpProcess {
    pub lambda: f64,
    pub mean: f64,
    pub vol: f64,
}

impl JumpProcess {
    /// Arrival-weighted second moment `lambda · (mean² + vol²)`.
    pub fn second_moment(&self) -> f64 {
        self.lambda * (self.mean.powi(2) + self.vol.powi(2))
    }

    fn from_model(models: &ModelSet, model: &str, suffix: &str) -> Result<Self> {
        Ok(Self {
            lambda: models.scalar_f64(model, &format!("BE_SVJD_E_Jump_Lambda{}", suffix))?,
            mean: models.scalar_f64(model, &format!("BE_SVJD_E_Jump_Mean{}", suffix))?,
            vol: models.scalar_f64(model, &format!("BE_SVJD_E_Jump_Vol{}", suffix))?,
        })
    }
}

/// Raw model inputs of the constant derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvjdInputs {
    pub primary_variance: VarianceProcess,
    pub primary_jump: JumpProcess,
    pub asset_variance: VarianceProcess,
    pub asset_jump: JumpProcess,
    /// Loadings on systematic factors 1 to 6.
    pub betas: [f64; 6],
    /// Variances of systematic factors 2 to 6 (supplied as vols, squared on read).
    pub factor_variances: [f64; 5],
}

impl SvjdInputs {
    pub fn from_models(models: &ModelSet) -> Result<Self> {
        let mut betas = [0.0; 6];
        for (i, beta) in betas.iter_mut().enumerate() {
            *beta = models.scalar_f64(ASSET_BETAS_MODEL, &format!("BE_E_Beta_f{}", i + 1))?;
        }
        let mut factor_variances = [0.0; 5];
        for (i, var) in factor_variances.iter_mut().enumerate() {
            let vol = models.scalar_f64(FACTOR_CONST_MODEL, &format!("BE_E_Fix_f{}_s1", i + 2))?;
            *var = vol.powi(2);
        }

        Ok(Self {
            primary_variance: VarianceProcess::from_model(models, PRIMARY_SVJD_MODEL, "_F1")?,
            primary_jump: JumpProcess::from_model(models, PRIMARY_SVJD_MODEL, "_F1")?,
            asset_variance: VarianceProcess::from_model(models, ASSET_SVJD_MODEL, "")?,
            asset_jump: JumpProcess::from_model(models, ASSET_SVJD_MODEL, "")?,
            betas,
            factor_variances,
        })
    }
}

/// The nine constants behind the negative-IV probability, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedConstants {
    pub gamma_k: f64,
    pub gamma_theta: f64,
    pub sigma_j2: f64,
    pub sys_vol: f64,
    pub variance_mean: f64,
    pub variance_var: f64,
    pub nu_infty: f64,
    pub parameter_a: f64,
    pub parameter_b: f64,
}

impl DerivedConstants {
    pub const NAMES: [&'static str; 9] = [
        "gamma_k",
        "gamma_theta",
        "sigma_J2",
        "sys_vol",
        "variance_mean",
        "variance_var",
        "nu_infty",
        "parameter_a",
        "parameter_b",
    ];

    pub fn entries(&self) -> [(&'static str, f64); 9] {
        let values = [
            self.gamma_k,
            self.gamma_theta,
            self.sigma_j2,
            self.sys_vol,
            self.variance_mean,
            self.variance_var,
            self.nu_infty,
            self.parameter_a,
            self.parameter_b,
        ];
        let mut out = [("", 0.0); 9];
        for (slot, (name, value)) in out.iter_mut().zip(Self::NAMES.iter().zip(values)) {
            *slot = (*name, value);
        }
        out
    }

    /// `{Name, Value}` rows in declaration order.
    pub fn to_rows(&self) -> Vec<Row> {
        self.entries()
            .iter()
            .map(|(name, value)| {
                let mut row = Row::new();
                row.insert("Name".to_string(), Value::from(*name));
                row.insert("Value".to_string(), Value::from(*value));
                row
            })
            .collect()
    }
}

/// Derive the constants from raw inputs. Any non-finite constant is an error.
pub fn derive_constants(inputs: &SvjdInputs) -> Result<DerivedConstants> {
    let b1_sq = inputs.betas[0].powi(2);
    let primary = &inputs.primary_variance;
    let asset = &inputs.asset_variance;

    let sys_vol: f64 = inputs.betas[1..]
        .iter()
        .zip(&inputs.factor_variances)
        .map(|(beta, var)| beta.powi(2) * var)
        .sum();

    // First two moments of the combined stationary variance
    let combined_mean = b1_sq * primary.rev_level + asset.rev_level;
    let combined_var =
        b1_sq.powi(2) * primary.stationary_variance() + asset.stationary_variance();

    let gamma_k = ensure_finite("gamma_k", combined_mean.powi(2) / combined_var)?;
    let gamma_theta = ensure_finite("gamma_theta", combined_var / combined_mean)?;
    let sigma_j2 = ensure_finite(
        "sigma_J2",
        0.25 * b1_sq * inputs.primary_jump.second_moment() + 0.25 * inputs.asset_jump.second_moment(),
    )?;
    let sys_vol = ensure_finite("sys_vol", sys_vol)?;
    let variance_mean = ensure_finite("variance_mean", combined_mean + sys_vol)?;
    let variance_var = ensure_finite("variance_var", combined_var)?;

    let level = sigma_j2 + variance_mean;
    let nu_infty = ensure_finite(
        "nu_infty",
        (level.sqrt() - 0.125 * level.powf(-1.5) * variance_var).powi(2) - sigma_j2,
    )?;
    let parameter_a = ensure_finite("parameter_a", sigma_j2 + sys_vol)?;
    let parameter_b = ensure_finite("parameter_b", -(sigma_j2 + nu_infty).sqrt())?;

    let constants = DerivedConstants {
        gamma_k,
        gamma_theta,
        sigma_j2,
        sys_vol,
        variance_mean,
        variance_var,
        nu_infty,
        parameter_a,
        parameter_b,
    };
    debug!(?constants, "derived negative-IV constants");
    Ok(constants)
}
