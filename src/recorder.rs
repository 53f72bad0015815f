//! JSON-lines writer for prediction records

use crate::types::prediction::{PredictionRecord, PredictionResult};
use anyhow::{Context, Result};
use std::io::Write;
use tracing::{debug, error};

/// Writes one `PredictionRecord` per line to any sink
pub struct RecordWriter<W: Write> {
    sink: W,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, written: 0 }
    }

    /// Write a record as one line; the line is encoded in full before
    /// anything reaches the sink
    pub fn write(&mut self, record: &PredictionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("Failed to encode prediction record")?;
        line.push(b'\n');
        self.sink
            .write_all(&line)
            .context("Failed to write prediction record")?;
        self.written += 1;

        debug!(
            record_id = %record.record_id,
            disease = %record.disease,
            label = %record.label,
            "Wrote prediction record"
        );
        Ok(())
    }

    /// Build a record for `caller` from a result and write it
    pub fn write_result(&mut self, result: &PredictionResult, caller: &str) -> Result<PredictionRecord> {
        let record = result
            .to_record(caller)
            .context("Failed to serialize prediction inputs")?;
        self.write(&record)?;
        Ok(record)
    }

    /// Write several records, stopping at the first failure so nothing
    /// follows a possibly torn line
    pub fn write_batch(&mut self, records: &[PredictionRecord]) -> Result<()> {
        for record in records {
            if let Err(e) = self.write(record) {
                error!(
                    record_id = %record.record_id,
                    written = self.written,
                    error = %e,
                    "Failed to write prediction record, stopping batch"
                );
                return Err(e);
            }
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush().context("Failed to flush prediction records")
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
