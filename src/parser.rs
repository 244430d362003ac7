//! Response parser: ordered extraction rules over free-form model output
//!
//! Each rule is a named value of [`ExtractionRule`] with its own `apply`
//! function, so rules can be unit-tested in isolation. [`parse_response`]
//! tries the rules for the declared [`ExpectedResponse`] in order and the
//! first match wins. The rule that fired is logged and persisted with the
//! trial so reparsing decisions can be audited later.
//!
//! Numeric rule order:
//!
//! 1. `QuotedField` - `"field": <number>`
//! 2. `UnitSuffix` - `<number> <unit>`
//! 3. `LastLineInteger` - a bare integer on the last non-empty line
//! 4. `PlausibleInteger` - the first integer inside the declared range

use std::fmt;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::experiment::ExpectedResponse;

/// A structured value extracted from a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedValue {
    /// Numeric answer.
    Number(f64),
    /// Categorical answer (normalised to the declared option spelling).
    Category(String),
}

impl ParsedValue {
    /// Numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Category(_) => None,
        }
    }

    /// Category label, if this is a category.
    #[must_use]
    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Category(c) => Some(c),
        }
    }
}

impl fmt::Display for ParsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Category(c) => f.write_str(c),
        }
    }
}

/// Named extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRule {
    /// `"field": <number>`
    QuotedField,
    /// `<number> <unit>`
    UnitSuffix,
    /// Bare integer on the last non-empty line.
    LastLineInteger,
    /// First integer within the declared plausible range.
    PlausibleInteger,
    /// `"field": "<option>"`
    CategoricalField,
    /// First whole-word occurrence of a declared option.
    CategoricalOption,
}

const NUMERIC_RULES: [ExtractionRule; 4] = [
    ExtractionRule::QuotedField,
    ExtractionRule::UnitSuffix,
    ExtractionRule::LastLineInteger,
    ExtractionRule::PlausibleInteger,
];

const CATEGORICAL_RULES: [ExtractionRule; 2] = [
    ExtractionRule::CategoricalField,
    ExtractionRule::CategoricalOption,
];

impl ExtractionRule {
    /// Rules applicable to an expected response, in precedence order.
    #[must_use]
    pub const fn ordered_for(expected: &ExpectedResponse) -> &'static [Self] {
        match expected {
            ExpectedResponse::Numeric { .. } => &NUMERIC_RULES,
            ExpectedResponse::Categorical { .. } => &CATEGORICAL_RULES,
        }
    }

    /// Stable rule name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::QuotedField => "quoted_field",
            Self::UnitSuffix => "unit_suffix",
            Self::LastLineInteger => "last_line_integer",
            Self::PlausibleInteger => "plausible_integer",
            Self::CategoricalField => "categorical_field",
            Self::CategoricalOption => "categorical_option",
        }
    }

    /// Apply this rule alone. Returns `None` if it does not match or does not
    /// apply to the expected response kind.
    #[must_use]
    pub fn apply(self, text: &str, expected: &ExpectedResponse) -> Option<ParsedValue> {
        match (self, expected) {
            (Self::QuotedField, ExpectedResponse::Numeric { field, .. }) => {
                quoted_number(text, field).map(ParsedValue::Number)
            }
            (Self::UnitSuffix, ExpectedResponse::Numeric { unit: Some(unit), .. }) => {
                unit_number(text, unit).map(ParsedValue::Number)
            }
            (Self::LastLineInteger, ExpectedResponse::Numeric { min, max, .. }) => {
                last_line_integer(text)
                    .filter(|n| in_range(*n, *min, *max))
                    .map(ParsedValue::Number)
            }
            (Self::PlausibleInteger, ExpectedResponse::Numeric { min, max, .. }) => {
                plausible_integer(text, *min, *max).map(ParsedValue::Number)
            }
            (Self::CategoricalField, ExpectedResponse::Categorical { field, options }) => {
                quoted_category(text, field, options).map(ParsedValue::Category)
            }
            (Self::CategoricalOption, ExpectedResponse::Categorical { options, .. }) => {
                first_option(text, options).map(ParsedValue::Category)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed value together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Extracted value.
    pub value: ParsedValue,
    /// Rule that fired.
    pub rule: ExtractionRule,
}

/// Parse a raw response against the expected shape.
///
/// Returns `None` when no rule matches; callers still persist the trial with
/// its raw text so it can be reparsed later.
///
/// # Examples
///
/// ```rust
/// use anchorlab::experiment::ExpectedResponse;
/// use anchorlab::parser::{parse_response, ExtractionRule, ParsedValue};
///
/// let expected = ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0).with_unit("months");
/// let text = r#"I considered 15 months. {"sentenceMonths": 12}"#;
/// let extraction = parse_response(text, &expected).unwrap();
/// assert_eq!(extraction.value, ParsedValue::Number(12.0));
/// assert_eq!(extraction.rule, ExtractionRule::QuotedField);
/// ```
#[must_use]
pub fn parse_response(text: &str, expected: &ExpectedResponse) -> Option<Extraction> {
    let extraction = ExtractionRule::ordered_for(expected)
        .iter()
        .find_map(|rule| rule.apply(text, expected).map(|value| Extraction { value, rule: *rule }));
    match &extraction {
        Some(e) => debug!(rule = %e.rule, value = %e.value, "extraction rule fired"),
        None => debug!(field = expected.field(), "no extraction rule matched"),
    }
    extraction
}

const NUMBER: &str = r"-?\d+(?:\.\d+)?";

fn quoted_number(text: &str, field: &str) -> Option<f64> {
    let pattern = format!(r#""{}"\s*:\s*"?({NUMBER})"#, regex::escape(field));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// `<number> <unit>`, or `<low>-<high> <unit>` / `<low> to <high> <unit>`
/// for a stated range, which yields the midpoint. A hyphen directly after a
/// digit is a range separator, never a sign.
fn unit_number(text: &str, unit: &str) -> Option<f64> {
    let stem = unit.strip_suffix('s').unwrap_or(unit);
    let pattern = format!(
        r"(?:^|[^\d.])(?:(\d+(?:\.\d+)?)\s*(?:-|–|\bto\b)\s*)?({NUMBER})\s*-?\s*{}s?\b",
        regex::escape(stem)
    );
    let re = RegexBuilder::new(&pattern).case_insensitive(true).build().ok()?;
    let caps = re.captures(text)?;
    let value: f64 = caps.get(2)?.as_str().parse().ok()?;
    match caps.get(1) {
        Some(low) => {
            let low: f64 = low.as_str().parse().ok()?;
            Some((low + value) / 2.0)
        }
        None => Some(value),
    }
}

fn last_line_integer(text: &str) -> Option<f64> {
    let line = text.lines().map(str::trim).rfind(|l| !l.is_empty())?;
    let bare = line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '.' | '"'));
    bare.parse::<i64>().ok().map(|n| n as f64)
}

fn integer_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:^|[^\d.])(-?\d+)\b").ok())
        .as_ref()
}

fn plausible_integer(text: &str, min: f64, max: f64) -> Option<f64> {
    let found = integer_pattern()?
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .map(|n| n as f64)
        .find(|n| in_range(*n, min, max));
    found
}

fn quoted_category(text: &str, field: &str, options: &[String]) -> Option<String> {
    let pattern = format!(r#""{}"\s*:\s*"([^"]*)""#, regex::escape(field));
    let re = Regex::new(&pattern).ok()?;
    let stated = re.captures(text)?.get(1)?.as_str().trim().to_lowercase();
    options.iter().find(|o| o.to_lowercase() == stated).cloned()
}

fn first_option(text: &str, options: &[String]) -> Option<String> {
    options
        .iter()
        .filter_map(|option| {
            let pattern = format!(r"\b{}\b", regex::escape(option));
            let re = RegexBuilder::new(&pattern).case_insensitive(true).build().ok()?;
            re.find(text).map(|m| (m.start(), option))
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, option)| option.clone())
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}
