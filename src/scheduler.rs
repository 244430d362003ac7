//! Idempotent, resumable trial scheduler
//!
//! A campaign runs every condition of one experiment against one provider
//! until each (model, condition) pair holds `desired` valid records. Rerunning
//! a campaign against the same sink is safe: already-satisfied conditions
//! execute nothing, partially filled ones top up.
//!
//! ```text
//! for condition in experiment.conditions():
//!     existing  = sink.count_valid(model, condition)
//!     remaining = desired - existing   (saturating)
//!     repeat remaining times:
//!         render steps → call provider → parse → append record
//! ```
//!
//! Trials run strictly sequentially. Trial-scoped failures (transport, JSON,
//! schema) are persisted as error records and the campaign continues after
//! `error_delay`; sink failures abort the campaign.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::experiment::{
    render_template, ExperimentCondition, ExperimentDefinition, PromptRole, TrialRecord,
};
use crate::parser::{parse_response, Extraction};
use crate::provider::{extract_json, Provider};
use crate::sacd::{run_sacd, SacdConfig};
use crate::sink::TrialSink;
use crate::stats::{numeric_observations, StatSummary};
use crate::{Error, Result};

/// Default pause after a failed trial.
pub const DEFAULT_ERROR_DELAY: Duration = Duration::from_secs(2);

/// Template variable holding the previous model response.
pub const PREVIOUS_RESPONSE_VAR: &str = "previous_response";

/// How the decision question of each trial is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TrialMode {
    /// One provider call for the decision question.
    #[default]
    Direct,
    /// Debias the decision prompt with SACD before answering.
    Sacd(SacdConfig),
}

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignConfig {
    error_delay: Duration,
    pacing: Duration,
    mode: TrialMode,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            error_delay: DEFAULT_ERROR_DELAY,
            pacing: Duration::ZERO,
            mode: TrialMode::Direct,
        }
    }
}

impl CampaignConfig {
    /// Create a builder with default settings.
    #[must_use]
    pub fn builder() -> CampaignConfigBuilder {
        CampaignConfigBuilder::default()
    }

    /// Pause after a failed trial.
    #[must_use]
    pub const fn error_delay(&self) -> Duration {
        self.error_delay
    }

    /// Pause after a successful trial.
    #[must_use]
    pub const fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Trial mode.
    #[must_use]
    pub const fn mode(&self) -> TrialMode {
        self.mode
    }
}

/// Builder for `CampaignConfig`.
#[derive(Debug, Default)]
pub struct CampaignConfigBuilder {
    config: CampaignConfig,
}

impl CampaignConfigBuilder {
    /// Set the pause after a failed trial.
    #[must_use]
    pub const fn error_delay(mut self, delay: Duration) -> Self {
        self.config.error_delay = delay;
        self
    }

    /// Set the pause after a successful trial.
    #[must_use]
    pub const fn pacing(mut self, pacing: Duration) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Set the trial mode.
    #[must_use]
    pub const fn mode(mut self, mode: TrialMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub const fn build(self) -> CampaignConfig {
        self.config
    }
}

/// Per-condition outcome of one campaign run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    /// Condition ID.
    pub condition_id: String,
    /// Valid records present before this run.
    pub existing: usize,
    /// Trials executed in this run.
    pub executed: usize,
    /// Executed trials that produced a parsed value.
    pub succeeded: usize,
    /// Executed trials whose response matched no extraction rule.
    pub parse_failures: usize,
    /// Executed trials persisted as error records.
    pub errors: usize,
    /// Summary over every numeric result in the sink for this condition.
    pub summary: StatSummary,
}

/// Outcome of one campaign run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Experiment ID.
    pub experiment_id: String,
    /// Model identifier.
    pub model_id: String,
    /// One entry per condition, in definition order.
    pub conditions: Vec<ConditionReport>,
}

impl CampaignReport {
    /// Total trials executed in this run.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.conditions.iter().map(|c| c.executed).sum()
    }

    /// Total error records written in this run.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.conditions.iter().map(|c| c.errors).sum()
    }

    /// Report for one condition.
    #[must_use]
    pub fn condition(&self, condition_id: &str) -> Option<&ConditionReport> {
        self.conditions
            .iter()
            .find(|c| c.condition_id == condition_id)
    }
}

/// What a successful trial produced.
struct TrialOutput {
    raw_response: String,
    extraction: Option<Extraction>,
    sacd_iterations: Option<u32>,
}

/// Running conversation of one trial.
#[derive(Default)]
struct Exchange {
    system: Option<String>,
    turns: Vec<(PromptRole, String)>,
}

impl Exchange {
    fn add_system(&mut self, text: String) {
        self.system = Some(match self.system.take() {
            Some(existing) => format!("{existing}\n\n{text}"),
            None => text,
        });
    }

    /// Prompt for the next user turn, carrying earlier turns as a transcript.
    fn prompt_for(&self, user_text: &str) -> String {
        if self.turns.is_empty() {
            return user_text.to_string();
        }
        let mut prompt = String::from("Conversation so far:\n");
        for (role, text) in &self.turns {
            let speaker = match role {
                PromptRole::Assistant => "Assistant",
                PromptRole::User | PromptRole::System => "User",
            };
            prompt.push_str(&format!("\n{speaker}: {text}\n"));
        }
        prompt.push_str(&format!("\nUser: {user_text}"));
        prompt
    }
}

/// Sequential trial executor for one provider.
pub struct TrialScheduler<'a, P> {
    provider: &'a P,
    config: CampaignConfig,
}

impl<'a, P: Provider> TrialScheduler<'a, P> {
    /// Scheduler bound to one provider.
    #[must_use]
    pub const fn new(provider: &'a P, config: CampaignConfig) -> Self {
        Self { provider, config }
    }

    /// Bring every condition up to `desired` valid records.
    ///
    /// # Errors
    ///
    /// Sink failures and non-trial-scoped provider errors abort the campaign.
    /// Trial-scoped failures are persisted as error records instead.
    pub async fn run_campaign<S: TrialSink>(
        &self,
        experiment: &ExperimentDefinition,
        desired: usize,
        sink: &mut S,
    ) -> Result<CampaignReport> {
        let model_id = self.provider.model_id();
        let span = info_span!("campaign", experiment = experiment.id(), model = model_id);
        async move {
            let mut conditions = Vec::with_capacity(experiment.conditions().len());
            for condition in experiment.conditions() {
                conditions.push(self.run_condition(experiment, condition, desired, sink).await?);
            }
            Ok(CampaignReport {
                experiment_id: experiment.id().to_string(),
                model_id: model_id.to_string(),
                conditions,
            })
        }
        .instrument(span)
        .await
    }

    async fn run_condition<S: TrialSink>(
        &self,
        experiment: &ExperimentDefinition,
        condition: &ExperimentCondition,
        desired: usize,
        sink: &mut S,
    ) -> Result<ConditionReport> {
        let model_id = self.provider.model_id();
        let existing = sink.count_valid(model_id, condition.id())?;
        let remaining = desired.saturating_sub(existing);
        info!(
            condition = condition.id(),
            existing, remaining, "scheduling condition"
        );

        let mut report = ConditionReport {
            condition_id: condition.id().to_string(),
            existing,
            executed: 0,
            succeeded: 0,
            parse_failures: 0,
            errors: 0,
            summary: StatSummary::from_values(&[]),
        };

        for i in 0..remaining {
            let run_index = u32::try_from(existing + i).unwrap_or(u32::MAX);
            let record = self
                .run_trial(experiment, condition, run_index)
                .instrument(info_span!("trial", condition = condition.id(), run_index))
                .await?;
            sink.append(&record)?;
            report.executed += 1;

            if record.is_valid() {
                if record.result().is_some() {
                    report.succeeded += 1;
                } else {
                    report.parse_failures += 1;
                }
                if !self.config.pacing.is_zero() {
                    tokio::time::sleep(self.config.pacing).await;
                }
            } else {
                report.errors += 1;
                if !self.config.error_delay.is_zero() {
                    tokio::time::sleep(self.config.error_delay).await;
                }
            }
        }

        let records = sink.records(model_id, condition.id())?;
        report.summary = StatSummary::from_values(&numeric_observations(&records));
        Ok(report)
    }

    /// Execute one trial and build its record.
    ///
    /// Trial-scoped errors become error records; anything else propagates.
    ///
    /// # Errors
    ///
    /// Returns non-trial-scoped errors unchanged.
    pub async fn run_trial(
        &self,
        experiment: &ExperimentDefinition,
        condition: &ExperimentCondition,
        run_index: u32,
    ) -> Result<TrialRecord> {
        let builder = TrialRecord::builder(
            experiment.id(),
            self.provider.model_id(),
            condition.id(),
            run_index,
        )
        .params(condition.params().clone())
        .temperature(self.provider.temperature());

        match self.execute(experiment, condition).await {
            Ok(output) => {
                let pure = extract_json(&output.raw_response).is_ok_and(|j| j.is_pure_json);
                match &output.extraction {
                    Some(extraction) => info!(value = %extraction.value, rule = %extraction.rule, "trial complete"),
                    None => warn!("trial response matched no extraction rule"),
                }
                let mut builder = builder
                    .is_pure_json(pure)
                    .extraction(output.extraction)
                    .raw_response(output.raw_response);
                if let Some(iterations) = output.sacd_iterations {
                    builder = builder.sacd_iterations(iterations);
                }
                Ok(builder.build())
            }
            Err(e) if e.is_trial_scoped() => {
                warn!(error = %e, kind = e.kind(), "trial failed");
                Ok(builder.error(&e).build())
            }
            Err(e) => Err(e),
        }
    }

    async fn execute(
        &self,
        experiment: &ExperimentDefinition,
        condition: &ExperimentCondition,
    ) -> Result<TrialOutput> {
        let steps = experiment.steps();
        let decision_step = steps
            .iter()
            .rposition(|s| s.role() == PromptRole::User)
            .unwrap_or(0);

        let mut vars: BTreeMap<String, Value> = condition.params().clone();
        let mut exchange = Exchange::default();
        let mut user_turns = 0usize;

        for (index, step) in steps.iter().enumerate() {
            let text = render_template(step.template(), &vars);
            match step.role() {
                PromptRole::System => exchange.add_system(text),
                PromptRole::Assistant => exchange.turns.push((PromptRole::Assistant, text)),
                PromptRole::User if index == decision_step => {
                    let prompt = exchange.prompt_for(&text);
                    return self.decide(&prompt, exchange.system.as_deref(), experiment).await;
                }
                PromptRole::User => {
                    let prompt = exchange.prompt_for(&text);
                    let response = self
                        .provider
                        .send_text(&prompt, exchange.system.as_deref())
                        .await?;
                    user_turns += 1;
                    vars.insert(
                        format!("step_{user_turns}_response"),
                        Value::String(response.clone()),
                    );
                    vars.insert(
                        PREVIOUS_RESPONSE_VAR.to_string(),
                        Value::String(response.clone()),
                    );
                    exchange.turns.push((PromptRole::User, text));
                    exchange.turns.push((PromptRole::Assistant, response));
                }
            }
        }

        Err(Error::InvalidInput(format!(
            "experiment `{}` has no user step",
            experiment.id()
        )))
    }

    async fn decide(
        &self,
        prompt: &str,
        system: Option<&str>,
        experiment: &ExperimentDefinition,
    ) -> Result<TrialOutput> {
        let expected = experiment.expected();
        match self.config.mode {
            TrialMode::Direct => {
                let raw = self.provider.send_text(prompt, system).await?;
                Ok(TrialOutput {
                    extraction: parse_response(&raw, expected),
                    raw_response: raw,
                    sacd_iterations: None,
                })
            }
            TrialMode::Sacd(sacd) => {
                let outcome = run_sacd(self.provider, prompt, system, expected, sacd).await?;
                Ok(TrialOutput {
                    raw_response: outcome.raw_response,
                    extraction: outcome.answer,
                    sacd_iterations: Some(outcome.iterations),
                })
            }
        }
    }
}

/// Run a campaign with the given configuration.
///
/// # Errors
///
/// As [`TrialScheduler::run_campaign`].
///
/// # Examples
///
/// ```rust,no_run
/// use anchorlab::config::ProviderConfig;
/// use anchorlab::experiment::ExperimentDefinition;
/// use anchorlab::scheduler::{run_campaign, CampaignConfig};
/// use anchorlab::sink::JsonlSink;
///
/// # async fn demo() -> anchorlab::Result<()> {
/// let experiment = ExperimentDefinition::from_path("experiments/sentencing.json")?;
/// let provider = ProviderConfig::from_env("openai/gpt-4o")?.build()?;
/// let mut sink = JsonlSink::new("results/sentencing.jsonl");
/// let report = run_campaign(&experiment, 30, &provider, &mut sink, &CampaignConfig::default()).await?;
/// println!("executed {} trials", report.executed());
/// # Ok(())
/// # }
/// ```
pub async fn run_campaign<P: Provider, S: TrialSink>(
    experiment: &ExperimentDefinition,
    desired: usize,
    provider: &P,
    sink: &mut S,
    config: &CampaignConfig,
) -> Result<CampaignReport> {
    TrialScheduler::new(provider, *config)
        .run_campaign(experiment, desired, sink)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExpectedResponse, PromptStep};
    use crate::sink::MemorySink;
    use crate::Error;
    use std::sync::Mutex;

    /// Echoes a fixed answer and records (prompt, system) pairs.
    struct RecordingProvider {
        answer: String,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl RecordingProvider {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Provider for RecordingProvider {
        fn model_id(&self) -> &str {
            "test/recording"
        }

        async fn send_text(&self, prompt: &str, system: Option<&str>) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), system.map(str::to_string)));
            Ok(self.answer.clone())
        }
    }

    struct FailingProvider;

    impl Provider for FailingProvider {
        fn model_id(&self) -> &str {
            "test/failing"
        }

        async fn send_text(&self, _prompt: &str, _system: Option<&str>) -> Result<String> {
            Err(Error::Transport("connection refused".into()))
        }
    }

    fn fast() -> CampaignConfig {
        CampaignConfig::builder().error_delay(Duration::ZERO).build()
    }

    fn experiment() -> ExperimentDefinition {
        ExperimentDefinition::builder("sentencing", "Sentencing anchor")
            .step(PromptStep::system("You are a judge."))
            .step(PromptStep::user(
                "The prosecutor demands {{anchor}} months. Is that too high?",
            ))
            .step(PromptStep::user(
                "You said: {{previous_response}}. Now give your sentence.",
            ))
            .condition(ExperimentCondition::new("low").param("anchor", 3))
            .condition(ExperimentCondition::new("high").param("anchor", 9))
            .expected(ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = CampaignConfig::default();
        assert_eq!(config.error_delay(), Duration::from_secs(2));
        assert_eq!(config.pacing(), Duration::ZERO);
        assert_eq!(config.mode(), TrialMode::Direct);
    }

    #[tokio::test]
    async fn test_multi_step_rendering() {
        let provider = RecordingProvider::new(r#"{"sentenceMonths": 5}"#);
        let mut sink = MemorySink::new();
        let experiment = ExperimentDefinition::builder("e", "e")
            .step(PromptStep::system("You are a judge."))
            .step(PromptStep::user("Anchor is {{anchor}}."))
            .step(PromptStep::user("Previously: {{previous_response}}"))
            .condition(ExperimentCondition::new("low").param("anchor", 3))
            .expected(ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0))
            .build()
            .unwrap();

        run_campaign(&experiment, 1, &provider, &mut sink, &fast())
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "Anchor is 3.");
        assert_eq!(calls[0].1.as_deref(), Some("You are a judge."));
        assert!(calls[1].0.contains("User: Anchor is 3."));
        assert!(calls[1].0.ends_with(r#"User: Previously: {"sentenceMonths": 5}"#));
    }

    #[tokio::test]
    async fn test_records_carry_params_and_purity() {
        let provider = RecordingProvider::new(r#"{"sentenceMonths": 5}"#);
        let mut sink = MemorySink::new();
        run_campaign(&experiment(), 2, &provider, &mut sink, &fast())
            .await
            .unwrap();

        let records = sink.all();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].condition_id(), "low");
        assert_eq!(records[2].condition_id(), "high");
        assert_eq!(records[1].run_index(), 1);
        assert_eq!(records[2].params()["anchor"], 9);
        assert_eq!(records[0].is_pure_json(), Some(true));
        assert_eq!(records[0].numeric_result(), Some(5.0));
        assert_eq!(records[0].sacd_iterations(), None);
    }

    #[tokio::test]
    async fn test_transport_failures_become_error_records() {
        let mut sink = MemorySink::new();
        let report = run_campaign(&experiment(), 2, &FailingProvider, &mut sink, &fast())
            .await
            .unwrap();

        assert_eq!(report.errors(), 4);
        assert_eq!(sink.len(), 4);
        assert!(sink.all().iter().all(|r| r.error_kind() == Some("transport")));
        assert_eq!(sink.count_valid("test/failing", "low").unwrap(), 0);
        assert_eq!(report.condition("low").unwrap().summary.n, 0);
    }

    #[tokio::test]
    async fn test_unparseable_response_is_valid_slot() {
        let provider = RecordingProvider::new("I cannot decide.");
        let mut sink = MemorySink::new();
        let report = run_campaign(&experiment(), 1, &provider, &mut sink, &fast())
            .await
            .unwrap();
        let low = report.condition("low").unwrap();
        assert_eq!(low.parse_failures, 1);
        assert_eq!(low.succeeded, 0);
        assert_eq!(sink.count_valid("test/recording", "low").unwrap(), 1);
    }
}
