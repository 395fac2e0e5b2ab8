//! Fjall-based persistence for integration job records
//!
//! Every processing attempt — webhook-triggered or pull-sync — is recorded
//! here as a [`JobRecord`] and walked through its lifecycle:
//!
//! ```text
//! queued -> running -> succeeded | failed
//! ```
//!
//! Transitions are forward-only; a terminal record never changes again.
//! `attempts` counts entries into `running`.
//!
//! Creation failures propagate to the caller: a job that cannot even be
//! recorded as queued is a hard stop, since processing must not proceed
//! invisibly. Status *updates* are best-effort from the pipeline's point of
//! view — the store reports the failure, the pipeline logs and moves on.

pub mod error;
pub mod keys;
pub mod store;

pub use error::{LedgerError, Result};
pub use store::{JobLedger, JobRecord, JobStatus, JobType};
