//! Parameter codec
//!
//! Wire parameter sets (`[{ "name": .., "values": [rows] }]`) decode into an ordered
//! [`ParameterMap`] whose entries are tagged [`ParamValue::Scalar`] or [`ParamValue::Table`].
//! Decoded input models are grouped by model name in a [`ModelSet`].

pub mod codec;
pub mod types;

pub use codec::*;
pub use types::*;
