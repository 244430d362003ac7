//! Append-only trial sinks
//!
//! A sink receives one [`TrialRecord`] per executed trial and answers the
//! only question the scheduler needs to resume a campaign: how many valid
//! records already exist for a (model, condition) pair.
//!
//! **Append-only write pattern**:
//! - Records are never mutated or removed once written
//! - Append order equals chronological execution order
//! - Resumption is count-based, not identity-based; two campaigns writing
//!   to one sink concurrently will over- or under-count
//!
//! # Example
//!
//! ```rust
//! use anchorlab::experiment::TrialRecord;
//! use anchorlab::sink::{MemorySink, TrialSink};
//!
//! let mut sink = MemorySink::new();
//! sink.append(&TrialRecord::builder("exp", "openai/gpt-4o", "low", 0).raw_response("12").build())?;
//! assert_eq!(sink.count_valid("openai/gpt-4o", "low")?, 1);
//! # Ok::<(), anchorlab::Error>(())
//! ```

mod jsonl;
mod memory;

pub use jsonl::JsonlSink;
pub use memory::MemorySink;

use crate::experiment::TrialRecord;
use crate::Result;

/// Destination for trial records.
pub trait TrialSink {
    /// Number of valid (non-error) records for a (model, condition) pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn count_valid(&self, model_id: &str, condition_id: &str) -> Result<usize> {
        Ok(self
            .records(model_id, condition_id)?
            .iter()
            .filter(|r| r.is_valid())
            .count())
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted. The scheduler
    /// treats this as fatal.
    fn append(&mut self, record: &TrialRecord) -> Result<()>;

    /// All records for a (model, condition) pair, in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn records(&self, model_id: &str, condition_id: &str) -> Result<Vec<TrialRecord>>;
}
