//! Partition key encoding
//!
//! Jobs are keyed `job#{id}` so a future partition scan can prefix-filter
//! without a schema change.

pub const JOB_PREFIX: &str = "job#";

pub fn encode_job_key(job_id: &str) -> String {
    format!("{JOB_PREFIX}{job_id}")
}
