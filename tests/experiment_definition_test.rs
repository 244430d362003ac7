//! Experiment definition loading tests

use anchorlab::experiment::{render_template, ExpectedResponse, ExperimentDefinition, PromptRole};
use anchorlab::Error;

fn demo_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/sentencing.json")
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_demo_definition() {
    let def = ExperimentDefinition::from_path(demo_path()).unwrap();

    assert_eq!(def.id(), "sentencing-anchor");
    assert_eq!(def.steps().len(), 3);
    assert_eq!(def.steps()[0].role(), PromptRole::System);
    assert_eq!(def.conditions().len(), 2);
    assert!(matches!(
        def.expected(),
        ExpectedResponse::Numeric { unit: Some(u), .. } if u == "months"
    ));

    let high = def.condition("high-anchor-9mo").unwrap();
    let rendered = render_template(def.steps()[1].template(), high.params());
    assert!(rendered.contains("sentence of 9 months"));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ExperimentDefinition::from_path("does/not/exist.json").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_malformed_json_is_serde_error() {
    let err = ExperimentDefinition::from_json_str("{\"id\": ").unwrap_err();
    assert!(matches!(err, Error::Serde(_)));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_definition_without_user_step_is_rejected() {
    let json = r#"{
        "id": "x", "name": "x",
        "steps": [{"role": "system", "template": "You are a judge."}],
        "conditions": [{"id": "a", "params": {}}],
        "expected": {"kind": "numeric", "field": "v", "min": 0, "max": 1}
    }"#;
    let err = ExperimentDefinition::from_json_str(json).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_duplicate_condition_ids_are_rejected() {
    let json = r#"{
        "id": "x", "name": "x",
        "steps": [{"role": "user", "template": "{{a}}"}],
        "conditions": [{"id": "a", "params": {}}, {"id": "a", "params": {}}],
        "expected": {"kind": "categorical", "field": "v", "options": ["yes", "no"]}
    }"#;
    let err = ExperimentDefinition::from_json_str(json).unwrap_err();
    assert!(err.to_string().contains("duplicate condition id"));
}

#[test]
fn test_empty_numeric_range_is_rejected() {
    let json = r#"{
        "id": "x", "name": "x",
        "steps": [{"role": "user", "template": "q"}],
        "conditions": [{"id": "a"}],
        "expected": {"kind": "numeric", "field": "v", "min": 5, "max": 1}
    }"#;
    assert!(ExperimentDefinition::from_json_str(json).is_err());
}
