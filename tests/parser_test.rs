//! Response parser tests
//!
//! Rules fire in precedence order; the first match wins even if a later rule
//! would match earlier in the text.

use anchorlab::experiment::ExpectedResponse;
use anchorlab::parser::{parse_response, ExtractionRule, ParsedValue};

fn months() -> ExpectedResponse {
    ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0).with_unit("months")
}

fn verdict() -> ExpectedResponse {
    ExpectedResponse::categorical("verdict", ["guilty", "not guilty"])
}

// =============================================================================
// Numeric rules
// =============================================================================

#[test]
fn test_pure_json_object() {
    let e = parse_response(r#"{"sentenceMonths": 8}"#, &months()).unwrap();
    assert_eq!(e.value, ParsedValue::Number(8.0));
    assert_eq!(e.rule, ExtractionRule::QuotedField);
}

#[test]
fn test_quoted_field_inside_markdown_fence() {
    let text = "Here you go:\n```json\n{\n  \"sentenceMonths\": 10.5\n}\n```";
    assert_eq!(
        parse_response(text, &months()).unwrap().value,
        ParsedValue::Number(10.5)
    );
}

#[test]
fn test_unit_suffix_case_insensitive_and_singular() {
    let e = parse_response("I sentence the defendant to 1 Month of probation.", &months()).unwrap();
    assert_eq!(e.value, ParsedValue::Number(1.0));
    assert_eq!(e.rule, ExtractionRule::UnitSuffix);
}

#[test]
fn test_last_line_integer() {
    let text = "After weighing the expert opinion and the\nprior convictions:\n\n**7**";
    let e = parse_response(text, &months()).unwrap();
    assert_eq!(e.value, ParsedValue::Number(7.0));
    assert_eq!(e.rule, ExtractionRule::LastLineInteger);
}

#[test]
fn test_plausible_integer_skips_out_of_range_numbers() {
    let text = "Case 2024 involves 12 prior offences; I lean toward leniency overall";
    let e = parse_response(text, &months()).unwrap();
    assert_eq!(e.value, ParsedValue::Number(12.0));
    assert_eq!(e.rule, ExtractionRule::PlausibleInteger);
}

#[test]
fn test_no_match_returns_none() {
    assert!(parse_response("I cannot make that decision.", &months()).is_none());
    assert!(parse_response("", &months()).is_none());
}

// =============================================================================
// Categorical rules
// =============================================================================

#[test]
fn test_categorical_field() {
    let e = parse_response(r#"{"verdict": "Not Guilty"}"#, &verdict()).unwrap();
    assert_eq!(e.value, ParsedValue::Category("not guilty".into()));
    assert_eq!(e.rule, ExtractionRule::CategoricalField);
}

#[test]
fn test_categorical_first_option_in_text() {
    let e = parse_response("The defendant is guilty, not innocent.", &verdict()).unwrap();
    assert_eq!(e.value, ParsedValue::Category("guilty".into()));
    assert_eq!(e.rule, ExtractionRule::CategoricalOption);
}

#[test]
fn test_numeric_rules_do_not_apply_to_categorical() {
    assert!(ExtractionRule::QuotedField
        .apply(r#"{"verdict": 3}"#, &verdict())
        .is_none());
}
