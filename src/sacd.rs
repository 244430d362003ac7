//! SACD: iterative self-critique debiasing
//!
//! ```text
//!            ┌───────────── not converged, iteration < max ─────────────┐
//!            ▼                                                          │
//!        ANALYZE ──── rewrite extracted ────▶ REWRITE_CHECK ────────────┘
//!            │                                     │
//!            │ malformed analysis                  │ converged or iteration == max
//!            ▼                                     ▼
//!          ANSWER ◀────────────────────────────────┘
//!            │
//!            ▼
//!          DONE
//! ```
//!
//! In `ANALYZE` the model names the biases in the current decision prompt,
//! proposes a debiased rewrite and says whether another pass is needed. The
//! step function is the model itself and therefore non-deterministic:
//! `max_iterations` is a cutoff, not a convergence proof. Only the final
//! answer and the iteration count outlive a trial.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::experiment::ExpectedResponse;
use crate::parser::{parse_response, Extraction};
use crate::provider::Provider;
use crate::Result;

/// Default bound on analysis rounds.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// SACD configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SacdConfig {
    /// Maximum number of `ANALYZE` rounds (at least 1).
    pub max_iterations: u32,
}

impl Default for SacdConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SacdConfig {
    /// Configuration with an explicit iteration bound (clamped to at least 1).
    #[must_use]
    pub fn with_max_iterations(max_iterations: u32) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }
}

/// State machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SacdPhase {
    /// Ask the model for a bias analysis and rewrite.
    Analyze,
    /// Decide between another round and answering.
    RewriteCheck,
    /// Ask the final decision question.
    Answer,
    /// Finished.
    Done,
}

/// One analysis round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SacdIteration {
    /// 1-based round number.
    pub iteration: u32,
    /// The model's bias analysis.
    pub bias_analysis: Option<String>,
    /// The proposed debiased prompt.
    pub rewritten_prompt: Option<String>,
    /// Whether the model asked for another round.
    pub needs_another_iteration: bool,
}

/// Result of a completed SACD run.
#[derive(Debug, Clone, PartialEq)]
pub struct SacdOutcome {
    /// Parsed final answer, if any rule matched.
    pub answer: Option<Extraction>,
    /// Raw text of the `ANSWER` call.
    pub raw_response: String,
    /// Analysis rounds actually used.
    pub iterations: u32,
    /// Per-round history (lives only as long as the trial).
    pub history: Vec<SacdIteration>,
    /// Prompt the final answer was asked against.
    pub final_prompt: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default, alias = "analysis", alias = "biasAnalysis")]
    bias_analysis: Option<String>,
    #[serde(
        default,
        alias = "rewritten_prompt",
        alias = "debiasedPrompt",
        alias = "rewrittenPrompt"
    )]
    debiased_prompt: Option<String>,
    #[serde(
        default,
        alias = "needsAnotherIteration",
        deserialize_with = "lenient_flag"
    )]
    needs_another_iteration: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    converged: Option<bool>,
}

/// Accepts `true`, `"true"`, `"yes"`, `1` and their negatives; anything
/// else reads as no signal.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0),
        _ => None,
    })
}

impl AnalysisResponse {
    /// Another round is requested only on an explicit signal.
    fn wants_another_iteration(&self) -> bool {
        match (self.needs_another_iteration, self.converged) {
            (Some(needs), _) => needs,
            (None, Some(converged)) => !converged,
            (None, None) => false,
        }
    }
}

fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bias_analysis": {"type": "string"},
            "debiased_prompt": {"type": "string"},
            "needs_another_iteration": {"type": "boolean"}
        },
        "required": ["bias_analysis", "debiased_prompt", "needs_another_iteration"]
    })
}

fn analysis_prompt(decision_prompt: &str) -> String {
    format!(
        "You are an expert in cognitive biases such as anchoring, framing, and status-quo bias.\n\
         Analyze the decision prompt below for content that could bias the decision.\n\
         Then rewrite the prompt so that bias-inducing content is removed or neutralized while \
         every decision-relevant fact is preserved.\n\
         Set needs_another_iteration to true only if your rewrite may still contain bias.\n\n\
         DECISION PROMPT:\n<<<\n{decision_prompt}\n>>>"
    )
}

/// Explicit SACD state for one trial.
#[derive(Debug, Clone)]
pub struct SacdState {
    phase: SacdPhase,
    current_prompt: String,
    iteration: u32,
    history: Vec<SacdIteration>,
}

impl SacdState {
    /// Start in `ANALYZE` at iteration 1 with the original decision prompt.
    #[must_use]
    pub fn new(decision_prompt: impl Into<String>) -> Self {
        Self {
            phase: SacdPhase::Analyze,
            current_prompt: decision_prompt.into(),
            iteration: 1,
            history: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SacdPhase {
        self.phase
    }

    /// Last known-good prompt.
    #[must_use]
    pub fn current_prompt(&self) -> &str {
        &self.current_prompt
    }

    /// Current iteration counter.
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Rounds recorded so far.
    #[must_use]
    pub fn history(&self) -> &[SacdIteration] {
        &self.history
    }
}

/// Drives the SACD state machine for one decision prompt.
pub struct SacdRunner<'a, P> {
    provider: &'a P,
    expected: &'a ExpectedResponse,
    system_prompt: Option<&'a str>,
    config: SacdConfig,
    state: SacdState,
    answer: Option<(String, Option<Extraction>)>,
}

impl<'a, P: Provider> SacdRunner<'a, P> {
    /// Prepare a run. `system_prompt` is used for the final answer only.
    #[must_use]
    pub fn new(
        provider: &'a P,
        expected: &'a ExpectedResponse,
        system_prompt: Option<&'a str>,
        config: SacdConfig,
        decision_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            expected,
            system_prompt,
            config: SacdConfig::with_max_iterations(config.max_iterations),
            state: SacdState::new(decision_prompt),
            answer: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &SacdState {
        &self.state
    }

    /// Perform one transition and return the new phase.
    ///
    /// # Errors
    ///
    /// Transport errors from the provider propagate. Malformed analyses do
    /// not: they short-circuit to `ANSWER`.
    pub async fn step(&mut self) -> Result<SacdPhase> {
        self.state.phase = match self.state.phase {
            SacdPhase::Analyze => self.analyze().await?,
            SacdPhase::RewriteCheck => self.rewrite_check(),
            SacdPhase::Answer => self.final_answer().await?,
            SacdPhase::Done => SacdPhase::Done,
        };
        debug!(
            phase = ?self.state.phase,
            iteration = self.state.iteration,
            "sacd transition"
        );
        Ok(self.state.phase)
    }

    /// Run to `DONE`.
    ///
    /// # Errors
    ///
    /// As [`SacdRunner::step`].
    pub async fn run(mut self) -> Result<SacdOutcome> {
        while self.state.phase != SacdPhase::Done {
            self.step().await?;
        }
        let (raw_response, answer) = self.answer.unwrap_or_default();
        Ok(SacdOutcome {
            answer,
            raw_response,
            iterations: self.state.iteration,
            history: self.state.history,
            final_prompt: self.state.current_prompt,
        })
    }

    async fn analyze(&mut self) -> Result<SacdPhase> {
        let schema = analysis_schema();
        let response = self
            .provider
            .send_json::<AnalysisResponse>(
                &analysis_prompt(&self.state.current_prompt),
                Some(&schema),
                None,
            )
            .await;

        let analysis = match response {
            Ok(response) => response.parsed,
            Err(e) if e.is_trial_scoped() && e.kind() == "parse" => {
                warn!(iteration = self.state.iteration, error = %e, "malformed sacd analysis");
                return Ok(SacdPhase::Answer);
            }
            Err(e) => return Err(e),
        };

        let rewrite = analysis
            .debiased_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let needs_another_iteration = analysis.wants_another_iteration();
        self.state.history.push(SacdIteration {
            iteration: self.state.iteration,
            bias_analysis: analysis.bias_analysis,
            rewritten_prompt: rewrite.clone(),
            needs_another_iteration,
        });

        match rewrite {
            Some(_) => Ok(SacdPhase::RewriteCheck),
            None => {
                warn!(iteration = self.state.iteration, "sacd analysis has no rewrite");
                Ok(SacdPhase::Answer)
            }
        }
    }

    fn rewrite_check(&mut self) -> SacdPhase {
        let Some(last) = self.state.history.last() else {
            return SacdPhase::Answer;
        };
        if let Some(rewrite) = &last.rewritten_prompt {
            self.state.current_prompt.clone_from(rewrite);
        }
        if !last.needs_another_iteration || self.state.iteration >= self.config.max_iterations {
            SacdPhase::Answer
        } else {
            self.state.iteration += 1;
            SacdPhase::Analyze
        }
    }

    async fn final_answer(&mut self) -> Result<SacdPhase> {
        let prompt = format!(
            "{}\n\n{}",
            self.state.current_prompt,
            self.expected.format_instruction()
        );
        let raw = self.provider.send_text(&prompt, self.system_prompt).await?;
        let extraction = parse_response(&raw, self.expected);
        self.answer = Some((raw, extraction));
        Ok(SacdPhase::Done)
    }
}

/// Run SACD for one decision prompt.
///
/// # Errors
///
/// Transport errors from the provider propagate.
pub async fn run_sacd<P: Provider>(
    provider: &P,
    decision_prompt: &str,
    system_prompt: Option<&str>,
    expected: &ExpectedResponse,
    config: SacdConfig,
) -> Result<SacdOutcome> {
    SacdRunner::new(provider, expected, system_prompt, config, decision_prompt)
        .run()
        .await
}
