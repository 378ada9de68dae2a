//! Factor-Loading Table and Curve Smoother
//!
//! The table joins the initial-IV surface with the factor-loading betas on canonical
//! `(maturity, strike)` keys. Optional smoothing re-samples the skew, kurtosis and
//! term-structure curves of each maturity onto a 0.05 strike grid by linear interpolation
//! through the 0.1-spaced coarse strikes.

pub mod interp;
pub mod smoothing;
pub mod types;

pub use smoothing::{apply_smoothing, merge_smoothed, smooth_curves, SmoothedCurve, SmoothedCurves};
pub use types::*;
