use eoiv_sorter::models::negative_iv::cumulative_probabilities;
use eoiv_sorter::tool::build_factor_loadings;
use eoiv_sorter::{
    decode_model_dict, derive_constants, IvColumn, Settings, SvjdInputs, DEFAULT_STEP_SIZE,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Negative IV Probability Demo");
    println!("============================");

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/data/e_usd_models.json".to_string());
    let models = decode_model_dict(&std::fs::read_to_string(&path)?, Some("model"))?;
    println!("Loaded {} models from {}", models.len(), path);

    let settings = Settings::from_models(&models)?;
    println!(
        "ScalingFactor: {:.6}  ApplySmoothing: {}",
        settings.scaling_factor, settings.apply_smoothing
    );

    // 1. Derived constants
    let inputs = SvjdInputs::from_models(&models)?;
    let constants = derive_constants(&inputs)?;
    println!("\nDerived constants:");
    for (name, value) in constants.entries() {
        println!("   {:<14} {:>22.15e}", name, value);
    }

    // 2. Joined factor-loading table
    let table = build_factor_loadings(&models)?;
    println!("\nFactor-loading grid points: {}", table.len());

    // 3. Per-column worst case, with the five riskiest grid points
    for column in [IvColumn::IvInf, IvColumn::InitialIv] {
        let per_row = cumulative_probabilities(
            settings.scaling_factor,
            &constants,
            &table,
            column,
            DEFAULT_STEP_SIZE,
        )?;
        let mut ranked: Vec<_> = per_row.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        println!("\n{}:", column);
        for (key, p) in ranked.iter().take(5) {
            println!("   {:<24} P(IV < 0) = {:.6e}", key.to_string(), p);
        }
    }

    Ok(())
}
