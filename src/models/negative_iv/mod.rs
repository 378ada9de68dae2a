//! Negative-IV Probability Engine
//!
//! Nine constants are derived from the SVJD model parameters: a Gamma fit of the combined
//! stationary variance (`gamma_k`, `gamma_theta`), the jump variance `sigma_J2`, and the
//! level-shift terms `parameter_a` / `parameter_b`. For every factor-loading row the engine
//! then integrates `Φ(threshold(Gamma⁻¹(p)))` over a percentile grid and reports the worst
//! row.

pub mod constants;
pub mod distributions;
pub mod probability;

pub use constants::{derive_constants, DerivedConstants, JumpProcess, SvjdInputs, VarianceProcess};
pub use distributions::{standard_normal_cdf, GammaQuantile};
pub use probability::{
    cumulative_probabilities, percentile_grid, probability_from_inputs,
    probability_of_negative_iv, NegativeIvResult, DEFAULT_STEP_SIZE,
};
