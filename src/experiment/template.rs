//! `{{var}}` template rendering for prompt steps

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Render a template by substituting `{{var}}` tokens from `vars`.
///
/// A token whose variable is absent is left untouched, so a partially
/// rendered template can be rendered again later with more variables.
/// String values are inserted verbatim, every other JSON value uses its
/// compact JSON text (`9`, `2.5`, `true`).
///
/// # Examples
///
/// ```rust
/// use std::collections::BTreeMap;
/// use anchorlab::experiment::render_template;
///
/// let mut vars = BTreeMap::new();
/// vars.insert("x".to_string(), serde_json::json!(9));
/// assert_eq!(render_template("Anchor: {{x}} months", &vars), "Anchor: 9 months");
/// assert_eq!(render_template("Anchor: {{x}} months", &BTreeMap::new()), "Anchor: {{x}} months");
/// ```
#[must_use]
pub fn render_template(template: &str, vars: &BTreeMap<String, Value>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value_text(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of all placeholders referenced by a template, in order of appearance.
#[must_use]
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_render_substitutes_number() {
        let rendered = render_template("Anchor: {{x}} months", &vars(&[("x", json!(9))]));
        assert_eq!(rendered, "Anchor: 9 months");
    }

    #[test]
    fn test_render_missing_variable_is_noop() {
        let template = "Anchor: {{x}} months";
        let once = render_template(template, &BTreeMap::new());
        assert_eq!(once, template);
        assert_eq!(render_template(&once, &BTreeMap::new()), template);
    }

    #[test]
    fn test_render_strings_are_unquoted() {
        let rendered = render_template("Hello {{ name }}!", &vars(&[("name", json!("Lena"))]));
        assert_eq!(rendered, "Hello Lena!");
    }

    #[test]
    fn test_render_partial() {
        let rendered = render_template("{{a}} and {{b}}", &vars(&[("a", json!(1))]));
        assert_eq!(rendered, "1 and {{b}}");
    }

    #[test]
    fn test_placeholders_in_order() {
        assert_eq!(placeholders("{{b}} {{a}} {{b}}"), vec!["b", "a", "b"]);
    }
}
