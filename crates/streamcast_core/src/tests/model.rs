use crate::error::ModelError;
use crate::model::{
    CalculationMode, Distribution, Model, ModelSettings, Stream, StreamType,
};

fn revenue(id: &str, amount: f64) -> Stream {
    Stream::new(
        id,
        format!("{id} stream"),
        StreamType::Revenue,
        0,
        Distribution::Fixed { value: amount },
    )
}

fn basic_model() -> Model {
    let mut model = Model::new("test", ModelSettings::default());
    model.add_stream(revenue("a", 1000.0));
    model.add_stream(revenue("b", 2000.0).with_parent("a"));
    model.add_stream(revenue("c", 3000.0));
    model
}

#[test]
fn test_add_and_iterate_in_display_order() {
    let model = basic_model();
    let ids: Vec<&str> = model.streams().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(model.len(), 3);
}

#[test]
fn test_remove_clears_child_references() {
    let mut model = basic_model();
    model.remove_stream("a").unwrap();
    assert!(model.stream("a").is_none());
    assert_eq!(model.stream("b").unwrap().parent_stream_id, None);
}

#[test]
fn test_remove_missing_stream_fails() {
    let mut model = basic_model();
    assert_eq!(
        model.remove_stream("nope"),
        Err(ModelError::StreamNotFound("nope".to_string()))
    );
}

#[test]
fn test_reorder() {
    let mut model = basic_model();
    model
        .reorder_streams(vec!["c".into(), "a".into(), "b".into()])
        .unwrap();
    let ids: Vec<&str> = model.streams().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["c", "a", "b"]);
}

#[test]
fn test_reorder_must_cover_all_streams() {
    let mut model = basic_model();
    assert!(matches!(
        model.reorder_streams(vec!["a".into(), "b".into()]),
        Err(ModelError::InvalidOrder(_))
    ));
    assert!(matches!(
        model.reorder_streams(vec!["a".into(), "b".into(), "x".into()]),
        Err(ModelError::StreamNotFound(_))
    ));
}

#[test]
fn test_get_children() {
    let model = basic_model();
    let children = model.get_children("a");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "b");
}

#[test]
fn test_execution_order_parents_first() {
    let mut model = basic_model();
    // Put the child ahead of its parent in display order.
    model
        .reorder_streams(vec!["b".into(), "a".into(), "c".into()])
        .unwrap();
    let order = model.execution_order().unwrap();
    let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
    assert!(pos("a") < pos("b"));
    assert_eq!(order.len(), 3);
}

#[test]
fn test_execution_order_ties_follow_display_order() {
    let model = basic_model();
    let order = model.execution_order().unwrap();
    assert_eq!(order, ["a", "c", "b"]);
}

#[test]
fn test_cycle_detected() {
    let mut model = Model::new("cyclic", ModelSettings::default());
    model.add_stream(revenue("a", 1.0).with_parent("b"));
    model.add_stream(revenue("b", 1.0).with_parent("a"));
    assert_eq!(model.validate(), Err(ModelError::CircularDependency));
    assert_eq!(model.execution_order(), Err(ModelError::CircularDependency));
}

#[test]
fn test_validate_dangling_parent() {
    let mut model = Model::new("dangling", ModelSettings::default());
    model.add_stream(revenue("a", 1.0).with_parent("ghost"));
    assert!(matches!(
        model.validate(),
        Err(ModelError::DanglingParent { .. })
    ));
}

#[test]
fn test_validate_conversion_rate_bounds() {
    let mut model = basic_model();
    model.stream_mut("b").unwrap().conversion_rate = 1.5;
    assert!(matches!(
        model.validate(),
        Err(ModelError::InvalidConversionRate { .. })
    ));
}

#[test]
fn test_validate_discount_must_exceed_growth_in_npv_mode() {
    let mut settings = ModelSettings::default();
    settings.discount_rate = Distribution::Fixed { value: 0.02 };
    settings.terminal_growth_rate = 0.025;
    let mut model = Model::new("tight", settings);
    model.add_stream(revenue("a", 1.0));
    assert!(matches!(
        model.validate(),
        Err(ModelError::DiscountNotAboveGrowth { .. })
    ));

    // The same rates are fine in IRR mode, which ignores discounting.
    model.settings.calculation_mode = CalculationMode::Irr;
    assert_eq!(model.validate(), Ok(()));
}

#[test]
fn test_serde_round_trip() {
    let mut model = basic_model();
    model.settings.escalation_rate = None;
    model
        .stream_mut("b")
        .unwrap()
        .periodicity_months = Some(12);
    model.stream_mut("b").unwrap().trigger_delay_months = 2;
    model.stream_mut("b").unwrap().amount_is_ratio = false;

    let json = serde_json::to_string(&model).unwrap();
    let back: Model = serde_json::from_str(&json).unwrap();

    assert_eq!(back.name, model.name);
    assert_eq!(back.settings, model.settings);
    assert_eq!(back.stream_order(), model.stream_order());
    assert_eq!(back.stream("b").unwrap(), model.stream("b").unwrap());
}

#[test]
fn test_serde_partial_stream_order_appends_missing() {
    // A wire order that omits a stream must not hide it from iteration or
    // trip the cycle check in the topological sort.
    let json = r#"{
        "name": "partial",
        "settings": {
            "discount_rate": {"type": "FIXED", "params": {"value": 0.1}}
        },
        "streams": [
            {
                "id": "a",
                "name": "A",
                "stream_type": "REVENUE",
                "start_month": 0,
                "amount": {"type": "FIXED", "params": {"value": 100.0}}
            },
            {
                "id": "b",
                "name": "B",
                "stream_type": "COST",
                "start_month": 0,
                "amount": {"type": "FIXED", "params": {"value": 40.0}}
            }
        ],
        "stream_order": ["a"]
    }"#;
    let model: Model = serde_json::from_str(json).unwrap();
    assert_eq!(model.stream_order(), ["a", "b"]);
    assert_eq!(model.streams().count(), 2);
    assert_eq!(model.validate(), Ok(()));
    assert_eq!(model.execution_order().unwrap(), ["a", "b"]);
}

#[test]
fn test_serde_missing_calculation_mode_defaults_to_npv() {
    let json = r#"{
        "name": "legacy",
        "settings": {
            "forecast_months": 24,
            "discount_rate": {"type": "FIXED", "params": {"value": 0.1}},
            "terminal_growth_rate": 0.02
        },
        "streams": [
            {
                "id": "rev",
                "name": "Revenue",
                "stream_type": "REVENUE",
                "start_month": 0,
                "amount": {"type": "FIXED", "params": {"value": 100.0}}
            }
        ]
    }"#;
    let model: Model = serde_json::from_str(json).unwrap();
    assert_eq!(model.settings.calculation_mode, CalculationMode::Npv);
    assert_eq!(model.settings.escalation_rate, None);
    assert_eq!(model.settings.forecast_months, 24);
    let stream = model.stream("rev").unwrap();
    assert_eq!(stream.conversion_rate, 1.0);
    assert!(stream.amount_is_ratio);
    assert_eq!(stream.end_month, None);
}
