//! In-memory sink.
//!
//! Data is lost on process restart. Used for dry runs and tests; campaigns
//! that must survive a crash write to [`JsonlSink`](super::JsonlSink).

use super::TrialSink;
use crate::experiment::TrialRecord;
use crate::Result;

/// In-memory append-only record list.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<TrialRecord>,
}

impl MemorySink {
    /// Create a new empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink pre-populated with records (e.g. a partial campaign).
    #[must_use]
    pub fn with_records(records: Vec<TrialRecord>) -> Self {
        Self { records }
    }

    /// Get the number of records in the sink.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the sink is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in append order.
    #[must_use]
    pub fn all(&self) -> &[TrialRecord] {
        &self.records
    }
}

impl TrialSink for MemorySink {
    fn count_valid(&self, model_id: &str, condition_id: &str) -> Result<usize> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.model_id() == model_id && r.condition_id() == condition_id)
            .filter(|r| r.is_valid())
            .count())
    }

    fn append(&mut self, record: &TrialRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn records(&self, model_id: &str, condition_id: &str) -> Result<Vec<TrialRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.model_id() == model_id && r.condition_id() == condition_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_sink_default() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.count_valid("m", "c").unwrap(), 0);
    }

    #[test]
    fn test_count_ignores_errors_and_other_pairs() {
        let mut sink = MemorySink::new();
        sink.append(&TrialRecord::builder("e", "m", "c", 0).raw_response("1").build())
            .unwrap();
        sink.append(
            &TrialRecord::builder("e", "m", "c", 1)
                .error(&Error::Transport("timeout".into()))
                .build(),
        )
        .unwrap();
        sink.append(&TrialRecord::builder("e", "m", "other", 0).build())
            .unwrap();
        sink.append(&TrialRecord::builder("e", "m2", "c", 0).build())
            .unwrap();

        assert_eq!(sink.len(), 4);
        assert_eq!(sink.count_valid("m", "c").unwrap(), 1);
        assert_eq!(sink.records("m", "c").unwrap().len(), 2);
    }

    #[test]
    fn test_records_keep_append_order() {
        let mut sink = MemorySink::new();
        for i in [2, 0, 1] {
            sink.append(&TrialRecord::builder("e", "m", "c", i).build()).unwrap();
        }
        let order: Vec<u32> = sink
            .records("m", "c")
            .unwrap()
            .iter()
            .map(TrialRecord::run_index)
            .collect();
        assert_eq!(order, vec![2, 0, 1]);
    }
}
