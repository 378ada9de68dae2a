//! Orchestrator: decode input models, build and optionally smooth the factor-loading table,
//! run the engine on both IV columns, and assemble the output model.

pub mod config;
pub mod pipeline;
pub mod types;

pub use config::SorterConfig;
pub use pipeline::{
    build_factor_loadings, decode_model_dict, read_betas, read_initial_iv, run_sorter,
    run_sorter_json,
};
pub use types::{Settings, SorterOutput, STATIC_PARAMETERS};
