//! Experiment data model
//!
//! Declarative experiment descriptions and the records produced by running
//! them.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentDefinition (1) ──< ExperimentCondition (N)
//!          │                          │
//!          ├── PromptStep (ordered)   └──< TrialRecord (N per model) [append-only]
//!          └── ExpectedResponse
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use anchorlab::experiment::{
//!     ExperimentCondition, ExperimentDefinition, ExpectedResponse, PromptStep,
//! };
//!
//! let experiment = ExperimentDefinition::builder("sentencing", "Sentencing anchor")
//!     .step(PromptStep::system("You are an experienced trial judge."))
//!     .step(PromptStep::user("The prosecutor demands {{anchor}} months. What sentence do you give?"))
//!     .condition(ExperimentCondition::new("low-anchor-3mo").param("anchor", 3))
//!     .condition(ExperimentCondition::new("high-anchor-9mo").param("anchor", 9))
//!     .expected(ExpectedResponse::numeric("sentenceMonths", 0.0, 120.0).with_unit("months"))
//!     .build()?;
//!
//! assert_eq!(experiment.conditions().len(), 2);
//! # Ok::<(), anchorlab::Error>(())
//! ```

mod definition;
mod template;
mod trial_record;

pub use definition::{
    ExpectedResponse, ExperimentCondition, ExperimentDefinition, ExperimentDefinitionBuilder,
    PromptRole, PromptStep,
};
pub use template::{placeholders, render_template};
pub use trial_record::{TrialRecord, TrialRecordBuilder};
