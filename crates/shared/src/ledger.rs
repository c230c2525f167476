use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::models::{ProgressRecord, RunSummary};

pub const PROGRESS_FILE_NAME: &str = "progress.jsonl";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize progress record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Run identifier of the form `<kind>-<YYYYMMDDHHMMSS>-<millis>`.
///
/// Two runs of the same kind started within the same millisecond collide.
pub fn generate_run_id(kind: &str) -> String {
    generate_run_id_at(kind, Local::now())
}

pub fn generate_run_id_at(kind: &str, now: DateTime<Local>) -> String {
    format!(
        "{}-{}-{:03}",
        kind,
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_millis() % 1000
    )
}

/// Append-only, line-delimited JSON log of run progress.
///
/// Every `log` call opens the file in append mode, writes one complete line
/// and closes it again. Appends through one handle are serialized and carry
/// non-decreasing timestamps; separate processes sharing the file get no
/// locking beyond what append mode gives them.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    last_timestamp: Mutex<f64>,
}

impl ProgressLedger {
    /// Ledger stored as `progress.jsonl` inside `output_dir`
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self::at_path(output_dir.as_ref().join(PROGRESS_FILE_NAME))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_timestamp: Mutex::new(f64::NEG_INFINITY),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(
        &self,
        run_id: &str,
        phase: &str,
        step: &str,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.log_extra(run_id, phase, step, status, message, Map::new())
    }

    pub fn log_extra(
        &self,
        run_id: &str,
        phase: &str,
        step: &str,
        status: impl Into<String>,
        message: impl Into<String>,
        extra: Map<String, Value>,
    ) -> Result<()> {
        // The guarded value is only the last timestamp, so a poisoned lock is still usable
        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        let timestamp = now.max(*last);

        let record = ProgressRecord {
            run_id: run_id.to_string(),
            phase: phase.to_string(),
            step: step.to_string(),
            status: status.into(),
            message: message.into(),
            timestamp,
            extra,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))?;
        file.flush().map_err(|source| self.io_error(source))?;

        *last = timestamp;
        debug!(run_id, phase, step, status = %record.status, "progress recorded");
        Ok(())
    }

    /// All records for `run_id`, in the order they were written
    pub fn read_run(&self, run_id: &str) -> Result<Vec<ProgressRecord>> {
        let lines = self.read_lines()?;
        Ok(lines
            .iter()
            .filter_map(|line| parse_line(line))
            .filter(|record| record.run_id == run_id)
            .collect())
    }

    /// The last `n` records across every run, oldest first.
    ///
    /// A corrupt line still counts toward `n` and is then dropped.
    pub fn tail(&self, n: usize) -> Result<Vec<ProgressRecord>> {
        let lines = self.read_lines()?;
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..]
            .iter()
            .filter_map(|line| parse_line(line))
            .collect())
    }

    pub fn summarize_run(&self, run_id: &str) -> Result<RunSummary> {
        let records = self.read_run(run_id)?;
        Ok(RunSummary::from_records(run_id, records))
    }

    fn read_lines(&self) -> Result<Vec<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path).map_err(|source| self.io_error(source))?;
        Ok(bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.trim_ascii().is_empty())
            .map(<[u8]>::to_vec)
            .collect())
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_line(line: &[u8]) -> Option<ProgressRecord> {
    match serde_json::from_slice::<ProgressRecord>(line) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(error = %e, "skipping unreadable ledger line");
            None
        }
    }
}
