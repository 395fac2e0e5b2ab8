use std::path::Path;

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{LedgerError, Result};
use super::keys::encode_job_key;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    WebhookOrder,
    WebhookMeasurement,
    SyncOrders,
    SyncMeasurements,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// One processing attempt, as persisted in the ledger
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: Value,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Webhook event id; absent for pull-triggered jobs
    pub event_id: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

/// Fjall-backed store for job lifecycle records
#[derive(Clone)]
pub struct JobLedger {
    keyspace: Keyspace,
    jobs: PartitionHandle,
}

impl JobLedger {
    /// Open or create a ledger at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening job ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, jobs })
    }

    /// Record a new job in `queued` state and return its id.
    ///
    /// Failure here must stop the caller: an attempt that cannot be recorded
    /// must not run.
    pub fn create_job(
        &self,
        job_type: JobType,
        payload: Value,
        event_id: Option<String>,
    ) -> Result<String> {
        let now = Utc::now();
        let record = JobRecord {
            job_id: Uuid::now_v7().to_string(),
            job_type,
            status: JobStatus::Queued,
            payload,
            attempts: 0,
            last_error: None,
            event_id,
            created_at: now,
            updated_at: now,
        };

        self.put(&record)?;
        debug!(job_id = %record.job_id, ?job_type, "Job created");
        Ok(record.job_id)
    }

    /// Advance a job's status.
    ///
    /// Transitions are forward-only; `attempts` is incremented on each entry
    /// into `running`. `last_error` replaces any previous error message.
    pub fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        last_error: Option<String>,
    ) -> Result<()> {
        let mut record = self
            .get(job_id)?
            .ok_or_else(|| LedgerError::JobNotFound(job_id.to_string()))?;

        if !transition_allowed(record.status, status) {
            return Err(LedgerError::InvalidTransition {
                from: record.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        if status == JobStatus::Running {
            record.attempts += 1;
        }
        if last_error.is_some() {
            record.last_error = last_error;
        }
        record.status = status;
        record.updated_at = Utc::now();

        self.put(&record)?;
        debug!(job_id, status = status.as_str(), "Job status updated");
        Ok(())
    }

    /// Get a job record by id
    pub fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let key = encode_job_key(job_id);
        match self.jobs.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    fn put(&self, record: &JobRecord) -> Result<()> {
        let key = encode_job_key(&record.job_id);
        let value = serde_json::to_vec(record)?;
        self.jobs.insert(key, value)?;
        Ok(())
    }
}

fn transition_allowed(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    match (from, to) {
        (Queued, Running) => true,
        // A job can fail before ever entering running (e.g. spawn refused)
        (Queued, Failed) => true,
        (Running, Succeeded) | (Running, Failed) => true,
        // Re-entering running is a retry of the same job
        (Running, Running) => true,
        _ => false,
    }
}
