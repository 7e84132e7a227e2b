//! Domain types for the job orchestrator.
//!
//! - Job: state machine, record and snapshot of one fetch request

pub mod job;

pub use job::{JobRecord, JobSnapshot, JobSpec, JobState};
