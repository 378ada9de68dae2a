pub mod factor_loadings;
pub mod negative_iv;
