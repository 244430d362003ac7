//! Experiment Definition - declarative description of an experiment

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Role attached to a prompt step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// System prompt applied to every subsequent call.
    System,
    /// Sent to the model; its response joins the running exchange.
    User,
    /// Pre-seeded assistant turn, added to the exchange without a call.
    Assistant,
}

/// A role-tagged template with `{{var}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptStep {
    role: PromptRole,
    template: String,
}

impl PromptStep {
    /// Create a step with an explicit role.
    #[must_use]
    pub fn new(role: PromptRole, template: impl Into<String>) -> Self {
        Self {
            role,
            template: template.into(),
        }
    }

    /// Create a system step.
    #[must_use]
    pub fn system(template: impl Into<String>) -> Self {
        Self::new(PromptRole::System, template)
    }

    /// Create a user step.
    #[must_use]
    pub fn user(template: impl Into<String>) -> Self {
        Self::new(PromptRole::User, template)
    }

    /// Create an assistant step.
    #[must_use]
    pub fn assistant(template: impl Into<String>) -> Self {
        Self::new(PromptRole::Assistant, template)
    }

    /// Get the step role.
    #[must_use]
    pub const fn role(&self) -> PromptRole {
        self.role
    }

    /// Get the raw template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

/// One treatment arm: an identifier plus a fixed parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentCondition {
    id: String,
    #[serde(default)]
    params: BTreeMap<String, Value>,
}

impl ExperimentCondition {
    /// Create a condition with no parameters.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a named parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Get the condition ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the parameter map.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

/// Shape of the answer the final step should produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedResponse {
    /// A number, e.g. a sentence length in months.
    Numeric {
        /// JSON field name the model is asked to fill.
        field: String,
        /// Unit suffix recognised in free text (e.g. "months").
        #[serde(default)]
        unit: Option<String>,
        /// Smallest plausible value.
        min: f64,
        /// Largest plausible value.
        max: f64,
    },
    /// One option out of an enumerated set.
    Categorical {
        /// JSON field name the model is asked to fill.
        field: String,
        /// Allowed options.
        options: Vec<String>,
    },
}

impl ExpectedResponse {
    /// Numeric response without a unit.
    #[must_use]
    pub fn numeric(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self::Numeric {
            field: field.into(),
            unit: None,
            min,
            max,
        }
    }

    /// Categorical response.
    #[must_use]
    pub fn categorical<I, S>(field: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Categorical {
            field: field.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a unit to a numeric response. No-op for categorical responses.
    #[must_use]
    pub fn with_unit(self, unit: impl Into<String>) -> Self {
        match self {
            Self::Numeric {
                field, min, max, ..
            } => Self::Numeric {
                field,
                unit: Some(unit.into()),
                min,
                max,
            },
            other => other,
        }
    }

    /// Name of the expected field.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Numeric { field, .. } | Self::Categorical { field, .. } => field,
        }
    }

    /// Strict output-format instruction appended to final prompts.
    #[must_use]
    pub fn format_instruction(&self) -> String {
        match self {
            Self::Numeric {
                field, unit, min, max,
            } => {
                let unit = unit.as_deref().map_or(String::new(), |u| format!(" in {u}"));
                format!(
                    "Respond with ONLY a JSON object of the form {{\"{field}\": <number>}} giving your answer{unit} \
                     as a number between {min} and {max}. Do not include any other text."
                )
            }
            Self::Categorical { field, options } => format!(
                "Respond with ONLY a JSON object of the form {{\"{field}\": \"<option>\"}} where <option> is one of: {}. \
                 Do not include any other text.",
                options.join(", ")
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Numeric { min, max, .. } if !(min <= max) => Err(Error::InvalidInput(format!(
                "numeric range is empty: min {min} > max {max}"
            ))),
            Self::Categorical { options, .. } if options.is_empty() => Err(Error::InvalidInput(
                "categorical response needs at least one option".to_string(),
            )),
            _ if self.field().trim().is_empty() => Err(Error::InvalidInput(
                "expected response field name is empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Declarative experiment: prompt steps, conditions and expected answer shape.
///
/// Immutable once built; construct with [`ExperimentDefinition::builder`] or
/// load a validated definition from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    id: String,
    name: String,
    steps: Vec<PromptStep>,
    conditions: Vec<ExperimentCondition>,
    expected: ExpectedResponse,
}

impl ExperimentDefinition {
    /// Create a builder with the required identifiers.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> ExperimentDefinitionBuilder {
        ExperimentDefinitionBuilder::new(id, name)
    }

    /// Parse and validate a definition from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serde` for malformed JSON and `Error::InvalidInput`
    /// when the definition fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load and validate a definition from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, otherwise as
    /// [`ExperimentDefinition::from_json_str`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the ordered prompt steps.
    #[must_use]
    pub fn steps(&self) -> &[PromptStep] {
        &self.steps
    }

    /// Get the conditions in declared order.
    #[must_use]
    pub fn conditions(&self) -> &[ExperimentCondition] {
        &self.conditions
    }

    /// Look up a condition by ID.
    #[must_use]
    pub fn condition(&self, id: &str) -> Option<&ExperimentCondition> {
        self.conditions.iter().find(|c| c.id() == id)
    }

    /// Get the expected response descriptor.
    #[must_use]
    pub const fn expected(&self) -> &ExpectedResponse {
        &self.expected
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("experiment id is empty".to_string()));
        }
        if !self.steps.iter().any(|s| s.role() == PromptRole::User) {
            return Err(Error::InvalidInput(format!(
                "experiment `{}` has no user prompt step",
                self.id
            )));
        }
        if self.conditions.is_empty() {
            return Err(Error::InvalidInput(format!(
                "experiment `{}` declares no conditions",
                self.id
            )));
        }
        let mut seen = BTreeSet::new();
        for condition in &self.conditions {
            if !seen.insert(condition.id()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate condition id `{}`",
                    condition.id()
                )));
            }
        }
        self.expected.validate()
    }
}

/// Builder for `ExperimentDefinition`.
#[derive(Debug)]
pub struct ExperimentDefinitionBuilder {
    id: String,
    name: String,
    steps: Vec<PromptStep>,
    conditions: Vec<ExperimentCondition>,
    expected: Option<ExpectedResponse>,
}

impl ExperimentDefinitionBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
            conditions: Vec::new(),
            expected: None,
        }
    }

    /// Append a prompt step.
    #[must_use]
    pub fn step(mut self, step: PromptStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a condition.
    #[must_use]
    pub fn condition(mut self, condition: ExperimentCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the expected response shape.
    #[must_use]
    pub fn expected(mut self, expected: ExpectedResponse) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Build and validate the `ExperimentDefinition`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if no expected response was set or the
    /// definition is inconsistent (no user step, no conditions, duplicate
    /// condition IDs, empty numeric range or option set).
    pub fn build(self) -> Result<ExperimentDefinition> {
        let expected = self
            .expected
            .ok_or_else(|| Error::InvalidInput("expected response is not set".to_string()))?;
        let definition = ExperimentDefinition {
            id: self.id,
            name: self.name,
            steps: self.steps,
            conditions: self.conditions,
            expected,
        };
        definition.validate()?;
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentencing() -> ExperimentDefinitionBuilder {
        ExperimentDefinition::builder("sentencing", "Judicial sentencing anchor")
            .step(PromptStep::system("You are a trial judge."))
            .step(PromptStep::user("The prosecutor demands {{anchor}} months."))
            .condition(ExperimentCondition::new("low-anchor-3mo").param("anchor", 3))
            .condition(ExperimentCondition::new("high-anchor-9mo").param("anchor", 9))
    }

    #[test]
    fn test_builder_requires_expected() {
        assert!(sentencing().build().is_err());
    }

    #[test]
    fn test_builder_valid() {
        let def = sentencing()
            .expected(ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0).with_unit("months"))
            .build()
            .unwrap();
        assert_eq!(def.conditions().len(), 2);
        assert_eq!(def.condition("low-anchor-3mo").unwrap().params()["anchor"], 3);
        assert_eq!(def.expected().field(), "sentenceMonths");
    }

    #[test]
    fn test_duplicate_condition_rejected() {
        let err = sentencing()
            .condition(ExperimentCondition::new("low-anchor-3mo"))
            .expected(ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate condition"));
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(sentencing()
            .expected(ExpectedResponse::numeric("x", 10.0, 1.0))
            .build()
            .is_err());
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "id": "loan",
            "name": "Loan approval",
            "steps": [{"role": "user", "template": "Approve a loan of {{amount}}?"}],
            "conditions": [{"id": "high", "params": {"amount": 50000}}],
            "expected": {"kind": "categorical", "field": "decision", "options": ["approve", "deny"]}
        }"#;
        let def = ExperimentDefinition::from_json_str(json).unwrap();
        assert_eq!(def.id(), "loan");
        assert!(matches!(def.expected(), ExpectedResponse::Categorical { .. }));
    }

    #[test]
    fn test_format_instruction_mentions_field_and_unit() {
        let expected = ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0).with_unit("months");
        let text = expected.format_instruction();
        assert!(text.contains("\"sentenceMonths\""));
        assert!(text.contains("in months"));
    }
}
