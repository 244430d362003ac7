//! Newline-delimited JSON file sink.
//!
//! The file is opened in append mode for every write and closed again, so a
//! killed process leaves at most one partial trailing line. Partial or
//! corrupt lines are skipped with a warning when reading; this is tolerance,
//! not a guarantee that a crash never loses a record.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::TrialSink;
use crate::experiment::TrialRecord;
use crate::Result;

/// Append-only JSONL sink (one record per line).
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
    sync: bool,
}

impl JsonlSink {
    /// Sink writing to `path`. The file is created on first append.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sync: false,
        }
    }

    /// Flush each record to disk (`fsync`) before returning from `append`.
    #[must_use]
    pub const fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Get the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed record in file order.
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<TrialRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrialRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping unreadable sink line"
                ),
            }
        }
        Ok(records)
    }
}

impl TrialSink for JsonlSink {
    fn append(&mut self, record: &TrialRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if ends_mid_line(&mut file)? {
            // Terminate a partial line left by an interrupted write.
            file.write_all(b"\n")?;
        }
        file.write_all(line.as_bytes())?;
        if self.sync {
            file.sync_data()?;
        }
        Ok(())
    }

    fn records(&self, model_id: &str, condition_id: &str) -> Result<Vec<TrialRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.model_id() == model_id && r.condition_id() == condition_id)
            .collect())
    }
}

fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
