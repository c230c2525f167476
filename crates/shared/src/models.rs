use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Conventional statuses written by the orchestrators.
///
/// The ledger itself stores any status string; this enum only names the
/// four values the binaries use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Started,
    Success,
    Error,
    Info,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Started => "started",
            Status::Success => "success",
            Status::Error => "error",
            Status::Info => "info",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

/// One line of the progress ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub run_id: String,
    pub phase: String,
    pub step: String,
    pub status: String,
    pub message: String,
    pub timestamp: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub extra: Map<String, Value>,
}

impl ProgressRecord {
    pub fn is_error(&self) -> bool {
        self.status == Status::Error.as_str()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Records of one phase, in ledger order
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecords {
    pub phase: String,
    pub records: Vec<ProgressRecord>,
}

/// Aggregate view of every record sharing a run id.
///
/// Computed on demand from the ledger, never stored. When `found` is false
/// the remaining fields are empty.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<PhaseRecords>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<f64>,
}

impl RunSummary {
    pub fn not_found(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            found: false,
            status: None,
            phases: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Build a summary from a run's records, which must be in ledger order
    pub fn from_records(run_id: impl Into<String>, records: Vec<ProgressRecord>) -> Self {
        let run_id = run_id.into();
        if records.is_empty() {
            return Self::not_found(run_id);
        }

        let status = if records.iter().any(ProgressRecord::is_error) {
            Status::Error
        } else {
            Status::Success
        };

        let started_at = records
            .iter()
            .map(|r| r.timestamp)
            .fold(f64::INFINITY, f64::min);
        let finished_at = records
            .iter()
            .map(|r| r.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut phases: Vec<PhaseRecords> = Vec::new();
        for record in records {
            match phases.iter_mut().find(|p| p.phase == record.phase) {
                Some(group) => group.records.push(record),
                None => phases.push(PhaseRecords {
                    phase: record.phase.clone(),
                    records: vec![record],
                }),
            }
        }

        Self {
            run_id,
            found: true,
            status: Some(status.to_string()),
            phases,
            started_at: Some(started_at),
            finished_at: Some(finished_at),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some(Status::Error.as_str())
    }
}
