
use approx::assert_relative_eq;
use eoiv_sorter::params::decode_value;
use eoiv_sorter::tool::{build_factor_loadings, read_betas, read_initial_iv, STATIC_PARAMETERS};
use eoiv_sorter::{
    decode_model_dict, run_sorter, run_sorter_json, GridKey, ParamValue, SorterConfig,
    SorterError,
};
use serde_json::{json, Value};
use test_utils::*;

const OUTPUT_ORDER: [&str; 21] = [
    "FactorLoadings",
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
    "Level.JumpVol",
    "Level.LevelScaling",
    "Level.LevelDisplacement",
    "Level.Alpha",
    "Prob.NegativeIV.DerivedConstants",
    "Prob.NegativeIV.IVInf",
    "Prob.NegativeIV.InitialIV",
];

fn run_dict(dict: &Value, config: &SorterConfig) -> eoiv_sorter::Result<eoiv_sorter::SorterOutput> {
    let models = decode_model_dict(&dict.to_string(), config.model_key.as_deref())?;
    run_sorter(&models, config)
}

/// Full run over the fixture: output order, copied parameters and both probabilities.
#[test]
fn test_end_to_end_output_model() {
    let models = load_models();
    let output = run_sorter(&models, &create_test_config()).expect("fixture run should succeed");
    let map = output.to_parameter_map();

    assert_eq!(
        map.names().collect::<Vec<_>>(),
        OUTPUT_ORDER.to_vec(),
        "output entries should follow the output model layout"
    );
    assert!(!output.smoothed);
    assert_eq!(output.factor_loadings.len(), 85);

    assert_eq!(map.get("SigmaInf"), Some(&ParamValue::Scalar(json!("0.2"))));
    assert_eq!(map.get("Skew.StartVal"), Some(&ParamValue::Scalar(json!("-0.4"))));
    assert_eq!(map.get("Level.Alpha"), Some(&ParamValue::Scalar(json!("2.4"))));
    assert_eq!(map.scalar_f64("Level.JumpVol").unwrap(), 0.0);
    assert_eq!(map.scalar_f64("Level.LevelDisplacement").unwrap(), 0.0);
    assert_eq!(
        map.scalar_f64("Level.LevelScaling").unwrap(),
        FIXTURE_SCALING_FACTOR
    );
    assert_relative_eq!(
        map.scalar_f64("Prob.NegativeIV.IVInf").unwrap(),
        EXPECTED_IVINF_PROBABILITY,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        map.scalar_f64("Prob.NegativeIV.InitialIV").unwrap(),
        EXPECTED_INITIAL_IV_PROBABILITY,
        max_relative = 1e-6
    );
    assert_eq!(STATIC_PARAMETERS.len(), 13);
}

#[test]
fn test_factor_loadings_table_layout() {
    let output = run_sorter(&load_models(), &create_test_config()).unwrap();
    let map = output.to_parameter_map();
    let rows = map.table("FactorLoadings").unwrap();

    assert_eq!(rows.len(), 85);
    assert_eq!(
        rows[0].keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "Maturity",
            "Strike",
            "InitialIV",
            "IVInf",
            "LevelBeta",
            "SkewBeta",
            "KurtosisBeta",
            "TermStructureBeta",
            "_index"
        ]
    );
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["_index"], json!(i + 1));
    }
    assert_eq!(rows[0]["Maturity"], json!(1.0));
    assert_eq!(rows[0]["Strike"], json!(0.6));
    assert_eq!(rows[0]["InitialIV"], json!(0.333892));
    assert_eq!(rows[84]["Maturity"], json!(10.0));
}

#[test]
fn test_derived_constants_table() {
    let output = run_sorter(&load_models(), &create_test_config()).unwrap();
    let map = output.to_parameter_map();
    let rows = map.table("Prob.NegativeIV.DerivedConstants").unwrap();

    let names: Vec<&str> = rows.iter().map(|r| r["Name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "gamma_k",
            "gamma_theta",
            "sigma_J2",
            "sys_vol",
            "variance_mean",
            "variance_var",
            "nu_infty",
            "parameter_a",
            "parameter_b"
        ]
    );
    assert_relative_eq!(
        rows[0]["Value"].as_f64().unwrap(),
        0.584103727767667,
        max_relative = 1e-10
    );
    assert_eq!(output.iv_inf.constants, output.initial_iv.constants);
}

/// Unmatched keys and rows with empty cells never reach the table.
#[test]
fn test_join_drops_unmatched_and_gap_rows() {
    let models = load_models();
    let table = build_factor_loadings(&models).unwrap();
    let expected = load_factor_loadings(FACTOR_LOADINGS_PATH).unwrap();

    assert_eq!(table, expected);
    assert!(table.get(&GridKey::new(1.0, 1.45)).is_none());
    assert!(table.get(&GridKey::new(20.0, 1.0)).is_none());
    assert!(table.get(&GridKey::new(30.0, 1.0)).is_none());
}

#[test]
fn test_result_document_round_trips() {
    let text = run_sorter_json(&models_json(), &create_test_config(), false).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    let list = doc.get("Output").expect("document keyed by output name").clone();

    let decoded = decode_value(list, None).unwrap();
    let output = run_sorter(&load_models(), &create_test_config()).unwrap();
    assert_eq!(decoded, output.to_parameter_map());
}

#[test]
fn test_output_name_and_pretty_printing() {
    let config = SorterConfig {
        output_name: "Assets.EQ.PEA.RWOIV".to_string(),
        ..create_test_config()
    };
    let text = run_sorter_json(&models_json(), &config, true).unwrap();
    assert!(text.contains('\n'));
    let doc: Value = serde_json::from_str(&text).unwrap();
    assert!(doc.get("Assets.EQ.PEA.RWOIV").is_some());
}

/// Payloads inlined as JSON values decode the same as payload strings.
#[test]
fn test_inline_model_payloads() {
    let mut dict = models_value();
    for (_, payload) in dict.as_object_mut().unwrap().iter_mut() {
        let inner: Value = serde_json::from_str(payload.as_str().unwrap()).unwrap();
        *payload = inner;
    }
    let inline = decode_model_dict(&dict.to_string(), Some("model")).unwrap();
    assert_eq!(inline, load_models());
}

/// Smoothing keeps every row and, on this fixture, the worst point and its probability.
#[test]
fn test_smoothing_enabled_by_config() {
    let config = create_test_config().with_smoothing(true);
    let output = run_sorter(&load_models(), &config).unwrap();
    assert!(output.smoothed);
    assert_eq!(output.factor_loadings.len(), 85);

    let row = output.factor_loadings.get(&GridKey::new(1.0, 0.65)).unwrap();
    assert_relative_eq!(row.skew_beta, 0.0089, max_relative = 1e-12);
    assert_relative_eq!(
        output.iv_inf.probability,
        EXPECTED_IVINF_PROBABILITY,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        output.initial_iv.probability,
        EXPECTED_INITIAL_IV_PROBABILITY,
        max_relative = 1e-6
    );
}

#[test]
fn test_smoothing_flag_from_settings() {
    let mut dict = models_value();
    set_scalar(&mut dict, "Settings", "ApplySmoothing", json!("TRUE"));
    let output = run_dict(&dict, &create_test_config()).unwrap();
    assert!(output.smoothed);

    // The text "false" disables smoothing
    set_scalar(&mut dict, "Settings", "ApplySmoothing", json!("false"));
    assert!(!run_dict(&dict, &create_test_config()).unwrap().smoothed);

    // Config override wins over the settings model
    let output = run_dict(&dict, &create_test_config().with_smoothing(true)).unwrap();
    assert!(output.smoothed);
}

#[test]
fn test_unreadable_settings_are_rejected() {
    let mut dict = models_value();
    set_scalar(&mut dict, "Settings", "ApplySmoothing", json!("sometimes"));
    assert!(matches!(
        run_dict(&dict, &create_test_config()),
        Err(SorterError::MalformedInput { .. })
    ));

    let mut dict = models_value();
    set_scalar(&mut dict, "Settings", "ScalingFactor", json!("n/a"));
    assert!(matches!(
        run_dict(&dict, &create_test_config()),
        Err(SorterError::MalformedInput { .. })
    ));
}

#[test]
fn test_scaling_factor_accepts_numbers() {
    let mut dict = models_value();
    set_scalar(&mut dict, "Settings", "ScalingFactor", json!(FIXTURE_SCALING_FACTOR));
    let output = run_dict(&dict, &create_test_config()).unwrap();
    assert_relative_eq!(
        output.iv_inf.probability,
        EXPECTED_IVINF_PROBABILITY,
        max_relative = 1e-6
    );
}

#[test]
fn test_missing_models_are_reported() {
    for model in ["Settings", "F1.SVJD", "RWOIV.Static", "InitialIV"] {
        let mut dict = models_value();
        remove_model(&mut dict, model);
        match run_dict(&dict, &create_test_config()) {
            Err(SorterError::MissingKey { key, .. }) => assert_eq!(key, model),
            other => panic!("expected MissingKey for {}, got {:?}", model, other),
        }
    }
}

#[test]
fn test_missing_parameter_names_model() {
    let mut dict = models_value();
    let mut payload: Value =
        serde_json::from_str(dict["Factors.Const"].as_str().unwrap()).unwrap();
    payload["model"]
        .as_array_mut()
        .unwrap()
        .retain(|e| e["name"] != "BE_E_Fix_f4_s1");
    dict["Factors.Const"] = payload;

    match run_dict(&dict, &create_test_config()) {
        Err(SorterError::MissingKey { key, context }) => {
            assert_eq!(key, "BE_E_Fix_f4_s1");
            assert!(context.contains("Factors.Const"));
        }
        other => panic!("expected MissingKey, got {:?}", other),
    }
}

#[test]
fn test_model_dictionary_must_be_object() {
    assert!(matches!(
        decode_model_dict("[1, 2]", Some("model")),
        Err(SorterError::MalformedInput { .. })
    ));
    match decode_model_dict(r#"{"Settings": "{\"parameters\": []}"}"#, Some("model")) {
        Err(SorterError::MissingKey { key, context }) => {
            assert_eq!(key, "model");
            assert!(context.contains("Settings"));
        }
        other => panic!("expected MissingKey, got {:?}", other),
    }
}

#[test]
fn test_fine_config_converges() {
    let coarse = run_sorter(&load_models(), &SorterConfig::standard()).unwrap();
    let fine = run_sorter(&load_models(), &SorterConfig::fine()).unwrap();
    assert_relative_eq!(
        fine.iv_inf.probability,
        1.093359620446856e-10,
        max_relative = 1e-6
    );
    let change = (fine.iv_inf.probability - coarse.iv_inf.probability).abs();
    assert!(
        change < 0.15 * coarse.iv_inf.probability,
        "fine grid should stay close to the standard one (change {})",
        change
    );
    assert_eq!(fine.iv_inf.worst_point, coarse.iv_inf.worst_point);
}

fn initial_iv_models(rows: Value) -> eoiv_sorter::ModelSet {
    let dict = json!({
        "InitialIV": {"model": [{"name": "Equity.ImpliedVol", "values": rows}]}
    });
    decode_model_dict(&dict.to_string(), Some("model")).expect("inline model should decode")
}

/// Two rows spelling the same grid point differently are a duplicate, not an overwrite.
#[test]
fn test_duplicate_grid_keys_are_rejected() {
    let models = initial_iv_models(json!([
        {"term": "1", "strike": "0.6", "value": "0.30"},
        {"term": "1.0", "strike": "0.60", "value": "0.99"}
    ]));
    match read_initial_iv(&models) {
        Err(SorterError::MalformedInput { message }) => {
            assert!(
                message.contains("Equity.ImpliedVol"),
                "message should name the table: {}",
                message
            );
            assert!(
                message.contains("strike 0.6"),
                "message should name the key: {}",
                message
            );
        }
        other => panic!("expected MalformedInput, got {:?}", other),
    }

    // Same for the betas, through a full run
    let mut dict = models_value();
    let mut payload: Value =
        serde_json::from_str(dict["RWOIV.Betas"].as_str().unwrap()).unwrap();
    let entry = payload["model"]
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|e| e["name"] == "FactorLoadings")
        .unwrap();
    let mut copy = entry["values"][0].clone();
    copy["maturity"] = json!("1.000");
    entry["values"].as_array_mut().unwrap().push(copy);
    dict["RWOIV.Betas"] = payload;

    let models = decode_model_dict(&dict.to_string(), Some("model")).unwrap();
    assert!(matches!(
        read_betas(&models),
        Err(SorterError::MalformedInput { .. })
    ));
    assert!(matches!(
        run_dict(&dict, &create_test_config()),
        Err(SorterError::MalformedInput { .. })
    ));
}

#[test]
fn test_non_finite_grid_keys_are_rejected() {
    for (term, strike) in [("NaN", "1.0"), ("1", "inf"), ("-inf", "0.6")] {
        let models = initial_iv_models(json!([
            {"term": "2", "strike": "1.0", "value": "0.25"},
            {"term": term, "strike": strike, "value": "0.30"}
        ]));
        assert!(
            matches!(read_initial_iv(&models), Err(SorterError::MalformedInput { .. })),
            "({}, {}) should be rejected",
            term,
            strike
        );
    }
}
