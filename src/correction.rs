//! Offline reparse of stored trials
//!
//! Records that were stored without a parsed value (or with one produced
//! under older extraction rules) can be reparsed from their raw text.
//! Corrections never touch the source sink: corrected copies, stamped with
//! `corrected_at`, go to a separate destination.

use tracing::info;

use crate::experiment::ExpectedResponse;
use crate::parser::parse_response;
use crate::sink::TrialSink;
use crate::Result;

/// Counts from one reparse pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionSummary {
    /// Records examined.
    pub examined: usize,
    /// Corrected copies written.
    pub corrected: usize,
    /// Records whose value was unchanged.
    pub unchanged: usize,
    /// Records with no raw text or no matching rule.
    pub unparseable: usize,
}

/// Reparse every valid record of a (model, condition) pair.
///
/// A corrected copy is written to `dest` only when reparsing yields a value
/// that differs from the stored one. Error records are skipped.
///
/// # Errors
///
/// Returns an error if either sink fails.
pub fn reparse_into<S, D>(
    source: &S,
    dest: &mut D,
    model_id: &str,
    condition_id: &str,
    expected: &ExpectedResponse,
) -> Result<CorrectionSummary>
where
    S: TrialSink + ?Sized,
    D: TrialSink + ?Sized,
{
    let mut summary = CorrectionSummary::default();
    for record in source
        .records(model_id, condition_id)?
        .into_iter()
        .filter(|r| r.is_valid())
    {
        summary.examined += 1;
        let Some(extraction) = record
            .raw_response()
            .and_then(|raw| parse_response(raw, expected))
        else {
            summary.unparseable += 1;
            continue;
        };
        if record.result() == Some(&extraction.value) {
            summary.unchanged += 1;
            continue;
        }
        info!(
            run_index = record.run_index(),
            value = %extraction.value,
            "correcting record"
        );
        dest.append(&record.corrected(extraction))?;
        summary.corrected += 1;
    }
    info!(
        model = model_id,
        condition = condition_id,
        examined = summary.examined,
        corrected = summary.corrected,
        "reparse complete"
    );
    Ok(summary)
}
