use crate::calculator::Calculator;
use crate::model::{Distribution, Model, ModelSettings, Stream, StreamType};
use crate::sensitivity::{ParameterKind, SensitivityAnalyzer, SETTINGS_STREAM_ID};

fn fixed(value: f64) -> Distribution {
    Distribution::Fixed { value }
}

fn uncertain(mean: f64, std: f64) -> Distribution {
    Distribution::Normal { mean, std }
}

fn saas_model() -> Model {
    let mut model = Model::new("saas", ModelSettings::default());
    model.add_stream(Stream::new(
        "subs",
        "Subscriptions",
        StreamType::Revenue,
        0,
        uncertain(10_000.0, 2_000.0),
    ));
    model.add_stream(Stream::new(
        "ops",
        "Operations",
        StreamType::Cost,
        0,
        fixed(3_000.0),
    ));
    model
}

#[test]
fn test_identifies_only_spread_parameters() {
    let model = saas_model();
    let params = SensitivityAnalyzer::new(&model).identify_uncertain_parameters();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].parameter_name, "Subscriptions - Amount");
    assert_eq!(params[0].stream_id, "subs");
    assert_eq!(params[0].kind, ParameterKind::Amount);
}

#[test]
fn test_identifies_settings_rates_first() {
    let mut model = saas_model();
    model.settings.discount_rate = Distribution::Uniform {
        min: 0.08,
        max: 0.15,
    };
    model.settings.escalation_rate = Some(uncertain(0.03, 0.01));
    let params = SensitivityAnalyzer::new(&model).identify_uncertain_parameters();
    assert_eq!(params.len(), 3);
    assert_eq!(params[0].parameter_name, "Discount Rate");
    assert_eq!(params[0].stream_id, SETTINGS_STREAM_ID);
    assert_eq!(params[1].parameter_name, "Escalation Rate");
    assert_eq!(params[2].parameter_name, "Subscriptions - Amount");
}

#[test]
fn test_ratio_child_labeled_price_ratio() {
    let mut model = saas_model();
    model.add_stream(
        Stream::new(
            "support",
            "Support",
            StreamType::Cost,
            0,
            uncertain(0.3, 0.05),
        )
        .with_parent("subs"),
    );
    let params = SensitivityAnalyzer::new(&model).identify_uncertain_parameters();
    let support = params
        .iter()
        .find(|p| p.stream_id == "support")
        .unwrap();
    assert_eq!(support.parameter_name, "Support - Price Ratio");
}

#[test]
fn test_unit_economics_exposes_both_factors() {
    let mut model = Model::new("units", ModelSettings::default());
    model.add_stream(
        Stream::new("hw", "Hardware", StreamType::Revenue, 0, fixed(0.0)).with_unit_economics(
            uncertain(50.0, 5.0),
            uncertain(200.0, 30.0),
        ),
    );
    let params = SensitivityAnalyzer::new(&model).identify_uncertain_parameters();
    let names: Vec<&str> = params.iter().map(|p| p.parameter_name.as_str()).collect();
    assert_eq!(names, ["Hardware - Unit Value", "Hardware - Market Units"]);
}

#[test]
fn test_override_pins_parameter() {
    let model = saas_model();
    let analyzer = SensitivityAnalyzer::new(&model);
    let params = analyzer.identify_uncertain_parameters();
    let low = analyzer.npv_with_override(&params[0], 0.0).unwrap();
    let high = analyzer.npv_with_override(&params[0], 20_000.0).unwrap();
    assert!(low < high);
    // Zero revenue leaves only the fixed cost.
    assert!(low < 0.0);
}

#[test]
fn test_tornado_baseline_matches_deterministic() {
    let model = saas_model();
    let tornado = SensitivityAnalyzer::new(&model).run_tornado_analysis(42).unwrap();
    let det = Calculator::new(&model).run_deterministic().unwrap();
    assert!((tornado.baseline_npv - det.npv.unwrap()).abs() < 1e-9);
}

#[test]
fn test_tornado_sorted_by_swing() {
    let mut model = saas_model();
    model.settings.discount_rate = Distribution::Uniform {
        min: 0.08,
        max: 0.15,
    };
    let tornado = SensitivityAnalyzer::new(&model).run_tornado_analysis(42).unwrap();
    assert!(tornado.parameters.len() >= 2);
    for pair in tornado.parameters.windows(2) {
        assert!(pair[0].swing >= pair[1].swing);
    }
    for bar in &tornado.parameters {
        assert!(bar.npv_low <= bar.npv_high);
        assert!((bar.swing - (bar.npv_high - bar.npv_low)).abs() < 1e-9);
        assert!(bar.p10_value < bar.p90_value);
    }
}

#[test]
fn test_tornado_leaves_model_untouched() {
    let model = saas_model();
    let before = serde_json::to_value(&model).unwrap();
    SensitivityAnalyzer::new(&model).run_tornado_analysis(42).unwrap();
    let after = serde_json::to_value(&model).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_tornado_all_fixed_model_is_empty() {
    let mut model = Model::new("flat", ModelSettings::default());
    model.add_stream(Stream::new(
        "rev",
        "Revenue",
        StreamType::Revenue,
        0,
        fixed(100.0),
    ));
    let tornado = SensitivityAnalyzer::new(&model).run_tornado_analysis(1).unwrap();
    assert_eq!(tornado.baseline_npv, 0.0);
    assert!(tornado.parameters.is_empty());
}

#[test]
fn test_tornado_tolerates_discount_p10_below_growth() {
    // P10 of this discount distribution sits below the terminal growth
    // rate. The pinned run values the terminal perpetuity at 0 for that
    // probe; the analysis must complete, not fail validation.
    let mut model = saas_model();
    model.settings.discount_rate = Distribution::Normal {
        mean: 0.05,
        std: 0.02,
    };
    model.settings.terminal_growth_rate = 0.025;
    assert!(model.validate().is_ok());

    let tornado = SensitivityAnalyzer::new(&model).run_tornado_analysis(42).unwrap();
    let dr_bar = tornado
        .parameters
        .iter()
        .find(|p| p.parameter_name == "Discount Rate")
        .unwrap();
    assert!(dr_bar.p10_value < 0.025, "p10 {}", dr_bar.p10_value);
    assert!(dr_bar.npv_low.is_finite());
    assert!(dr_bar.npv_high.is_finite());
}

#[test]
fn test_override_below_growth_zeroes_terminal_value() {
    let model = saas_model();
    let analyzer = SensitivityAnalyzer::new(&model);
    let dr_param = crate::sensitivity::UncertainParameter {
        stream_id: SETTINGS_STREAM_ID.to_string(),
        stream_name: "Model Settings".to_string(),
        parameter_name: "Discount Rate".to_string(),
        kind: ParameterKind::DiscountRate,
        distribution: model.settings.discount_rate.clone(),
    };
    // Pinning the rate below growth is a valid probe; NPV is the plain
    // discounted sum with no perpetuity on top.
    let npv = analyzer.npv_with_override(&dr_param, 0.01).unwrap();
    assert!(npv.is_finite());
    let det = Calculator::new(&model).run_deterministic().unwrap();
    // At a lower rate and with no terminal value, the two differ.
    assert!((npv - det.npv.unwrap()).abs() > 1.0);
}

#[test]
fn test_tornado_reproducible() {
    let model = saas_model();
    let analyzer = SensitivityAnalyzer::new(&model);
    let a = analyzer.run_tornado_analysis(7).unwrap();
    let b = analyzer.run_tornado_analysis(7).unwrap();
    assert_eq!(a.parameters[0].p10_value, b.parameters[0].p10_value);
    assert_eq!(a.parameters[0].npv_low, b.parameters[0].npv_low);
}
