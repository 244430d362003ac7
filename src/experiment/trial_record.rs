//! Trial Record - the unit of persistence

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parser::{Extraction, ExtractionRule, ParsedValue};
use crate::Error;

/// One executed trial: a single run of an experiment's prompt sequence
/// against one model for one condition.
///
/// Records are append-only. Corrections never mutate a record; they produce
/// a new one via [`TrialRecord::corrected`] that is written to a separate sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialRecord {
    experiment_id: String,
    model_id: String,
    condition_id: String,
    run_index: u32,
    #[serde(default)]
    params: BTreeMap<String, Value>,
    result: Option<ParsedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rule: Option<ExtractionRule>,
    raw_response: Option<String>,
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_pure_json: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sacd_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    corrected_at: Option<DateTime<Utc>>,
}

impl TrialRecord {
    /// Create a builder with the identifying fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        model_id: impl Into<String>,
        condition_id: impl Into<String>,
        run_index: u32,
    ) -> TrialRecordBuilder {
        TrialRecordBuilder::new(experiment_id, model_id, condition_id, run_index)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the model identifier.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Get the condition ID.
    #[must_use]
    pub fn condition_id(&self) -> &str {
        &self.condition_id
    }

    /// Get the run index within the (model, condition) pair.
    #[must_use]
    pub const fn run_index(&self) -> u32 {
        self.run_index
    }

    /// Get the input parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Get the parsed result, if any rule matched.
    #[must_use]
    pub const fn result(&self) -> Option<&ParsedValue> {
        self.result.as_ref()
    }

    /// Get the extraction rule that produced the result.
    #[must_use]
    pub const fn rule(&self) -> Option<ExtractionRule> {
        self.rule
    }

    /// Get the raw response text of the final call.
    #[must_use]
    pub fn raw_response(&self) -> Option<&str> {
        self.raw_response.as_deref()
    }

    /// Get the error message, if the trial failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get the error kind label, if the trial failed.
    #[must_use]
    pub fn error_kind(&self) -> Option<&str> {
        self.error_kind.as_deref()
    }

    /// Whether the final raw response was a pure JSON object.
    #[must_use]
    pub const fn is_pure_json(&self) -> Option<bool> {
        self.is_pure_json
    }

    /// Number of SACD iterations used, for debiased trials.
    #[must_use]
    pub const fn sacd_iterations(&self) -> Option<u32> {
        self.sacd_iterations
    }

    /// Sampling temperature the provider was constructed with.
    #[must_use]
    pub const fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Get the collection timestamp.
    #[must_use]
    pub const fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    /// Get the correction timestamp, for records produced by reparsing.
    #[must_use]
    pub const fn corrected_at(&self) -> Option<DateTime<Utc>> {
        self.corrected_at
    }

    /// A record is valid (occupies its trial slot) when it carries no error.
    ///
    /// Unparsed responses are valid: the call succeeded and the raw text can
    /// be reparsed. Error records are not, so a rerun retries them.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Numeric result, if the trial produced one.
    #[must_use]
    pub fn numeric_result(&self) -> Option<f64> {
        self.result.as_ref().and_then(ParsedValue::as_number)
    }

    /// A corrected copy carrying a new extraction. The original is untouched.
    #[must_use]
    pub fn corrected(&self, extraction: Extraction) -> Self {
        Self {
            result: Some(extraction.value),
            rule: Some(extraction.rule),
            corrected_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}

/// Builder for `TrialRecord`.
#[derive(Debug)]
pub struct TrialRecordBuilder {
    record: TrialRecord,
}

impl TrialRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        model_id: impl Into<String>,
        condition_id: impl Into<String>,
        run_index: u32,
    ) -> Self {
        Self {
            record: TrialRecord {
                experiment_id: experiment_id.into(),
                model_id: model_id.into(),
                condition_id: condition_id.into(),
                run_index,
                params: BTreeMap::new(),
                result: None,
                rule: None,
                raw_response: None,
                error: None,
                error_kind: None,
                is_pure_json: None,
                sacd_iterations: None,
                temperature: None,
                collected_at: Utc::now(),
                corrected_at: None,
            },
        }
    }

    /// Set the input parameters.
    #[must_use]
    pub fn params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.record.params = params;
        self
    }

    /// Set the parsed result and the rule that produced it.
    #[must_use]
    pub fn extraction(mut self, extraction: Option<Extraction>) -> Self {
        if let Some(extraction) = extraction {
            self.record.result = Some(extraction.value);
            self.record.rule = Some(extraction.rule);
        }
        self
    }

    /// Set the parsed result without a rule.
    #[must_use]
    pub fn result(mut self, value: ParsedValue) -> Self {
        self.record.result = Some(value);
        self
    }

    /// Set the raw response text.
    #[must_use]
    pub fn raw_response(mut self, raw: impl Into<String>) -> Self {
        self.record.raw_response = Some(raw.into());
        self
    }

    /// Mark the record as failed with the given error.
    #[must_use]
    pub fn error(mut self, error: &Error) -> Self {
        self.record.error = Some(error.to_string());
        self.record.error_kind = Some(error.kind().to_string());
        self
    }

    /// Set the JSON purity flag.
    #[must_use]
    pub const fn is_pure_json(mut self, pure: bool) -> Self {
        self.record.is_pure_json = Some(pure);
        self
    }

    /// Set the number of SACD iterations used.
    #[must_use]
    pub const fn sacd_iterations(mut self, iterations: u32) -> Self {
        self.record.sacd_iterations = Some(iterations);
        self
    }

    /// Set the provider temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: Option<f64>) -> Self {
        self.record.temperature = temperature;
        self
    }

    /// Set a custom collection timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn collected_at(mut self, collected_at: DateTime<Utc>) -> Self {
        self.record.collected_at = collected_at;
        self
    }

    /// Build the `TrialRecord`.
    #[must_use]
    pub fn build(self) -> TrialRecord {
        self.record
    }
}
