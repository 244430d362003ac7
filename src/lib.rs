//! # Anchorlab: Anchoring-Bias Experiments Against LLMs
//!
//! **Version**: 0.1.0
//!
//! Anchorlab runs declarative cognitive-bias experiments (vignette, anchor
//! conditions, expected answer shape) against language models, persists
//! every trial as an append-only record, optionally debiases prompts with
//! iterative self-critique (SACD), and computes the statistics used to
//! compare conditions.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Trial-scoped failures are recorded, never silently dropped
//! - **Poka-Yoke**: Configuration problems fail before the first trial
//! - **Genchi Genbutsu**: Raw responses are stored so values can be reparsed
//! - **Kaizen**: Campaigns are resumable; rerunning only fills the gaps
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use anchorlab::config::ProviderConfig;
//! use anchorlab::experiment::ExperimentDefinition;
//! use anchorlab::scheduler::{run_campaign, CampaignConfig};
//! use anchorlab::sink::JsonlSink;
//! use anchorlab::stats::{compare_samples, numeric_observations, BootstrapConfig};
//! use anchorlab::sink::TrialSink;
//!
//! # async fn demo() -> anchorlab::Result<()> {
//! let experiment = ExperimentDefinition::from_path("experiments/sentencing.json")?;
//! let provider = ProviderConfig::from_env("anthropic/claude-3-5-sonnet-20241022")?.build()?;
//! let mut sink = JsonlSink::new("results/sentencing.jsonl");
//!
//! run_campaign(&experiment, 30, &provider, &mut sink, &CampaignConfig::default()).await?;
//!
//! let model = "anthropic/claude-3-5-sonnet-20241022";
//! let low = numeric_observations(&sink.records(model, "low-anchor-3mo")?);
//! let high = numeric_observations(&sink.records(model, "high-anchor-9mo")?);
//! let comparison = compare_samples(&high, &low, &BootstrapConfig::default())?;
//! println!("anchoring effect: {:.2} months", comparison.difference.point_estimate);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod correction;
pub mod error;
pub mod experiment;
pub mod parser;
pub mod provider;
pub mod sacd;
pub mod scheduler;
pub mod sink;
pub mod stats;

pub use error::{Error, Result};
pub use experiment::{ExperimentDefinition, TrialRecord};
pub use parser::{parse_response, ParsedValue};
pub use provider::{AnyProvider, Provider};
pub use scheduler::{run_campaign, CampaignConfig, CampaignReport, TrialMode};
pub use sink::{JsonlSink, MemorySink, TrialSink};
